//! Voice command service
//!
//! One long-lived thread owns the transcriber and pushes [`VoiceEvent`]s
//! over a channel; the UI tick drains them. The thread never touches app
//! state directly. The one piece of state flowing the other way is the
//! inquiry flag, which decides whether an utterance is matched against
//! the reply vocabulary before the command vocabulary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::config::{PlaybackConfig, VoiceConfig};
use crate::matching::{
    self, InquiryReply, VoiceCommand,
};
use crate::speech::{SttError, Transcriber};

/// How long a recognized utterance stays on screen before the next listen
const HEARD_HOLD: Duration = Duration::from_millis(2500);

/// Idle gap after which the status falls back to "Ready"
const READY_AFTER_IDLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    /// Calibration done, loop running
    Ready,
    /// About to capture a phrase
    Listening,
    /// Raw transcript, shown before dispatch
    Heard(String),
    /// Audio captured but not understood
    DidntCatch,
    /// Recognition service failed
    ServiceError,
    /// Microphone failed; when sent from calibration the loop is gone
    MicError,
    /// Inquiry reply below threshold, still waiting
    WaitingForReply,
    /// No command matched the utterance
    Unrecognized(String),
    /// A general command matched
    Action {
        command: VoiceCommand,
        phrase: &'static str,
    },
    /// An inquiry reply matched
    InquiryReply {
        reply: InquiryReply,
        phrase: &'static str,
    },
    /// A supported language was mentioned
    SetLanguage(String),
}

/// Flags shared between the UI and the voice thread
pub struct VoiceShared {
    running: AtomicBool,
    inquiry_pending: AtomicBool,
}

/// Thresholds and capture windows, taken from config at startup
#[derive(Debug, Clone)]
pub struct VoiceTuning {
    pub command_threshold: u8,
    pub inquiry_threshold: u8,
    pub listen_timeout_secs: f64,
    pub phrase_limit_secs: f64,
    pub calibration_secs: f64,
    pub languages: Vec<String>,
    pub heard_hold: Duration,
}

impl VoiceTuning {
    pub fn from_config(voice: &VoiceConfig, playback: &PlaybackConfig) -> Self {
        Self {
            command_threshold: voice.command_threshold,
            inquiry_threshold: voice.inquiry_threshold,
            listen_timeout_secs: voice.listen_timeout_secs,
            phrase_limit_secs: voice.phrase_limit_secs,
            calibration_secs: voice.calibration_secs,
            languages: playback.supported_languages.clone(),
            heard_hold: HEARD_HOLD,
        }
    }
}

pub struct VoiceService {
    shared: Arc<VoiceShared>,
    events: Receiver<VoiceEvent>,
    thread: Option<JoinHandle<()>>,
}

impl VoiceService {
    /// Start the capture loop on its own thread
    pub fn spawn(
        transcriber: Box<dyn Transcriber>,
        tuning: VoiceTuning,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(VoiceShared {
            running: AtomicBool::new(true),
            inquiry_pending: AtomicBool::new(false),
        });
        let (tx, rx) = unbounded();

        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("voice-commands".to_string())
            .spawn(move || run_loop(transcriber, thread_shared, tuning, tx))?;

        Ok(Self {
            shared,
            events: rx,
            thread: Some(thread),
        })
    }

    /// Event stream for the tick drain
    pub fn events(&self) -> &Receiver<VoiceEvent> {
        &self.events
    }

    /// Route the next utterances to the inquiry vocabulary
    pub fn set_inquiry_pending(&self, pending: bool) {
        self.shared.inquiry_pending.store(pending, Ordering::SeqCst);
    }

    /// Ask the loop to exit after its current capture
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for VoiceService {
    fn drop(&mut self) {
        self.stop();
        // the loop can sit in a capture for several seconds; let the
        // thread finish on its own rather than blocking shutdown
        self.thread.take();
    }
}

fn run_loop(
    mut transcriber: Box<dyn Transcriber>,
    shared: Arc<VoiceShared>,
    tuning: VoiceTuning,
    tx: Sender<VoiceEvent>,
) {
    if let Err(e) = transcriber.calibrate(tuning.calibration_secs) {
        log::error!("voice: calibration failed: {}", e);
        let _ = tx.send(VoiceEvent::MicError);
        return;
    }
    log::info!("voice: calibrated, loop running");
    if tx.send(VoiceEvent::Ready).is_err() {
        return;
    }
    let mut last_heard = Instant::now();

    while shared.running.load(Ordering::SeqCst) {
        if tx.send(VoiceEvent::Listening).is_err() {
            break;
        }

        match transcriber.listen_phrase(tuning.listen_timeout_secs, tuning.phrase_limit_secs) {
            Ok(text) => {
                last_heard = Instant::now();
                let _ = tx.send(VoiceEvent::Heard(text.clone()));
                dispatch(&text, &shared, &tuning, &tx);
                std::thread::sleep(tuning.heard_hold);
            }
            Err(SttError::Timeout) => {
                if last_heard.elapsed() > READY_AFTER_IDLE {
                    let _ = tx.send(VoiceEvent::Ready);
                }
            }
            Err(SttError::NoSpeech) => {
                let _ = tx.send(VoiceEvent::DidntCatch);
            }
            Err(SttError::Service(e)) => {
                log::warn!("voice: recognition service failed: {}", e);
                let _ = tx.send(VoiceEvent::ServiceError);
            }
            Err(SttError::Mic(e)) => {
                log::warn!("voice: microphone failed: {}", e);
                let _ = tx.send(VoiceEvent::MicError);
            }
            Err(SttError::Worker(e)) => {
                // the sidecar respawns on the next call
                log::warn!("voice: worker hiccup: {}", e);
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    }
    log::info!("voice: loop stopped");
}

fn dispatch(
    text: &str,
    shared: &VoiceShared,
    tuning: &VoiceTuning,
    tx: &Sender<VoiceEvent>,
) {
    // a mentioned language always wins
    if let Some(language) = matching::detect_language(text, &tuning.languages) {
        let _ = tx.send(VoiceEvent::SetLanguage(language.to_string()));
        return;
    }

    if shared.inquiry_pending.load(Ordering::SeqCst) {
        match matching::match_inquiry_reply(text, tuning.inquiry_threshold) {
            Some(m) => {
                let _ = tx.send(VoiceEvent::InquiryReply {
                    reply: m.reply,
                    phrase: m.phrase,
                });
            }
            None => {
                let _ = tx.send(VoiceEvent::WaitingForReply);
            }
        }
        return;
    }

    match matching::match_command(text, tuning.command_threshold) {
        Some(m) => {
            log::info!("voice: '{}' matched '{}' ({})", text, m.phrase, m.score);
            let _ = tx.send(VoiceEvent::Action {
                command: m.command,
                phrase: m.phrase,
            });
        }
        None => {
            let _ = tx.send(VoiceEvent::Unrecognized(text.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::SttResult;
    use std::collections::VecDeque;

    /// Plays back a fixed sequence, then times out forever
    struct ScriptedTranscriber {
        calibration: SttResult<()>,
        phrases: VecDeque<SttResult<String>>,
    }

    impl ScriptedTranscriber {
        fn new(phrases: Vec<SttResult<String>>) -> Self {
            Self {
                calibration: Ok(()),
                phrases: phrases.into_iter().collect(),
            }
        }
    }

    impl Transcriber for ScriptedTranscriber {
        fn calibrate(&mut self, _seconds: f64) -> SttResult<()> {
            std::mem::replace(&mut self.calibration, Ok(()))
        }

        fn listen_phrase(&mut self, _timeout: f64, _limit: f64) -> SttResult<String> {
            match self.phrases.pop_front() {
                Some(result) => result,
                None => {
                    // keep the loop cheap once the script runs out
                    std::thread::sleep(Duration::from_millis(20));
                    Err(SttError::Timeout)
                }
            }
        }
    }

    fn tuning() -> VoiceTuning {
        VoiceTuning {
            command_threshold: 70,
            inquiry_threshold: 65,
            listen_timeout_secs: 3.0,
            phrase_limit_secs: 6.0,
            calibration_secs: 2.0,
            languages: vec![
                "english".to_string(),
                "malayalam".to_string(),
                "hindi".to_string(),
                "tamil".to_string(),
            ],
            heard_hold: Duration::ZERO,
        }
    }

    fn wait_for(service: &VoiceService, want: &VoiceEvent) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            match service.events().recv_timeout(Duration::from_millis(100)) {
                Ok(event) if &event == want => return true,
                Ok(_) => {}
                Err(_) => {}
            }
        }
        false
    }

    #[test]
    fn test_command_flow_emits_heard_then_action() {
        let stt = ScriptedTranscriber::new(vec![Ok("pause music".to_string())]);
        let service = VoiceService::spawn(Box::new(stt), tuning()).unwrap();

        assert!(wait_for(&service, &VoiceEvent::Heard("pause music".to_string())));
        assert!(wait_for(
            &service,
            &VoiceEvent::Action {
                command: VoiceCommand::Pause,
                phrase: "pause music",
            }
        ));
        service.stop();
    }

    #[test]
    fn test_language_mention_beats_commands() {
        // "play" would match Resume, but the language mention wins
        let stt = ScriptedTranscriber::new(vec![Ok("play hindi songs".to_string())]);
        let service = VoiceService::spawn(Box::new(stt), tuning()).unwrap();

        assert!(wait_for(
            &service,
            &VoiceEvent::SetLanguage("hindi".to_string())
        ));
        service.stop();
    }

    #[test]
    fn test_inquiry_flag_routes_to_reply_vocabulary() {
        let stt = ScriptedTranscriber::new(vec![
            Ok("blah blah".to_string()),
            Ok("vent".to_string()),
        ]);
        let service = VoiceService::spawn(Box::new(stt), tuning()).unwrap();
        service.set_inquiry_pending(true);

        assert!(wait_for(&service, &VoiceEvent::WaitingForReply));
        assert!(wait_for(
            &service,
            &VoiceEvent::InquiryReply {
                reply: InquiryReply::Same,
                phrase: "vent",
            }
        ));
        service.stop();
    }

    #[test]
    fn test_unrecognized_and_error_events() {
        let stt = ScriptedTranscriber::new(vec![
            Ok("completely unrelated words".to_string()),
            Err(SttError::NoSpeech),
            Err(SttError::Service("api down".to_string())),
        ]);
        let service = VoiceService::spawn(Box::new(stt), tuning()).unwrap();

        assert!(wait_for(
            &service,
            &VoiceEvent::Unrecognized("completely unrelated words".to_string())
        ));
        assert!(wait_for(&service, &VoiceEvent::DidntCatch));
        assert!(wait_for(&service, &VoiceEvent::ServiceError));
        service.stop();
    }

    #[test]
    fn test_calibration_failure_sends_mic_error_and_exits() {
        let mut stt = ScriptedTranscriber::new(vec![]);
        stt.calibration = Err(SttError::Mic("no device".to_string()));
        let service = VoiceService::spawn(Box::new(stt), tuning()).unwrap();

        assert!(wait_for(&service, &VoiceEvent::MicError));
        // the loop is gone; no Listening events follow
        assert!(!wait_for(&service, &VoiceEvent::Listening));
    }
}
