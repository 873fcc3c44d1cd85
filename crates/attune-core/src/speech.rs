//! Text-to-speech and speech-to-text
//!
//! TTS shells out to whatever the platform ships (PowerShell, `say`,
//! `espeak`) on a fire-and-forget thread. Transcription goes through the
//! listen worker sidecar, which owns the microphone and the recognizer
//! session between calls.

use serde_json::json;
use thiserror::Error;

use crate::sidecar::{SidecarError, SidecarWorker};

/// Spoken prompts to the user
pub trait Speaker: Send + Sync {
    /// Queue one utterance; returns immediately
    fn say(&self, text: &str);
}

/// Platform speech synthesis via a shell command
#[derive(Debug, Default)]
pub struct NativeSpeaker;

impl Speaker for NativeSpeaker {
    fn say(&self, text: &str) {
        let text = text.to_string();
        std::thread::spawn(move || {
            let result = speech_command(&text).output();
            match result {
                Ok(output) if !output.status.success() => {
                    log::warn!(
                        "say: speech command failed: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                Ok(_) => {}
                Err(e) => log::warn!("say: cannot run speech command: {}", e),
            }
        });
    }
}

#[cfg(target_os = "windows")]
fn speech_command(text: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("powershell");
    let escaped = text.replace('\'', "''");
    cmd.arg("-Command").arg(format!(
        "Add-Type -AssemblyName System.Speech; \
         (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{}')",
        escaped
    ));
    cmd
}

#[cfg(target_os = "macos")]
fn speech_command(text: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("say");
    cmd.arg(text);
    cmd
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn speech_command(text: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("espeak");
    cmd.arg(text);
    cmd
}

/// Speaker that discards everything, for tests and muted setups
#[derive(Debug, Default)]
pub struct NullSpeaker;

impl Speaker for NullSpeaker {
    fn say(&self, _text: &str) {}
}

#[derive(Error, Debug)]
pub enum SttError {
    /// Nothing was said before the listen timeout
    #[error("Listen timed out")]
    Timeout,

    /// Audio was captured but not understood
    #[error("Could not understand audio")]
    NoSpeech,

    #[error("Speech service error: {0}")]
    Service(String),

    #[error("Microphone unavailable: {0}")]
    Mic(String),

    #[error(transparent)]
    Worker(#[from] SidecarError),
}

pub type SttResult<T> = Result<T, SttError>;

/// Microphone capture and transcription
pub trait Transcriber: Send {
    /// Sample ambient noise so the recognizer can set its energy floor
    fn calibrate(&mut self, seconds: f64) -> SttResult<()>;

    /// Block until one phrase is transcribed or a limit hits
    fn listen_phrase(&mut self, timeout_secs: f64, phrase_limit_secs: f64) -> SttResult<String>;
}

/// Transcriber backed by the listen worker sidecar
pub struct WorkerTranscriber {
    worker: SidecarWorker,
}

impl WorkerTranscriber {
    pub fn new() -> Self {
        Self {
            worker: SidecarWorker::new("listen_worker.py"),
        }
    }

    #[cfg(test)]
    fn with_worker(worker: SidecarWorker) -> Self {
        Self { worker }
    }
}

impl Default for WorkerTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcriber for WorkerTranscriber {
    fn calibrate(&mut self, seconds: f64) -> SttResult<()> {
        let reply = self
            .worker
            .request(&json!({"type": "calibrate", "seconds": seconds}))?;
        match reply.get("type").and_then(|t| t.as_str()) {
            Some("calibrated") => Ok(()),
            _ => Err(stt_error_from(&reply)),
        }
    }

    fn listen_phrase(&mut self, timeout_secs: f64, phrase_limit_secs: f64) -> SttResult<String> {
        let reply = self.worker.request(&json!({
            "type": "listen",
            "timeout": timeout_secs,
            "phrase_limit": phrase_limit_secs,
        }))?;
        match reply.get("type").and_then(|t| t.as_str()) {
            Some("transcript") => {
                let text = reply
                    .get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .to_string();
                Ok(text)
            }
            _ => Err(stt_error_from(&reply)),
        }
    }
}

fn stt_error_from(reply: &serde_json::Value) -> SttError {
    let reason = reply.get("reason").and_then(|r| r.as_str()).unwrap_or("");
    let message = reply
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown")
        .to_string();
    match reason {
        "timeout" => SttError::Timeout,
        "no_speech" => SttError::NoSpeech,
        "mic" => SttError::Mic(message),
        "service" => SttError::Service(message),
        _ => SttError::Worker(SidecarError::Protocol(format!(
            "unexpected reply: {}",
            reply
        ))),
    }
}
