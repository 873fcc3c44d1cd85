//! Sidecar worker process management
//!
//! The camera classifier and the speech recognizer run as long-lived
//! Python processes shipped under `workers/`, speaking newline-delimited
//! JSON over stdin/stdout. Keeping them resident avoids paying model
//! import time on every call. A worker that dies or garbles a reply is
//! dropped and respawned on the next request.
//!
//! `ATTUNE_PYTHON` overrides the interpreter, `ATTUNE_WORKERS` the
//! script directory.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use thiserror::Error;

pub const PYTHON_ENV: &str = "ATTUNE_PYTHON";
pub const WORKERS_ENV: &str = "ATTUNE_WORKERS";

#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    #[error("Worker I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker protocol error: {0}")]
    Protocol(String),
}

pub type SidecarResult<T> = Result<T, SidecarError>;

/// Interpreter used for worker scripts
pub fn python_bin() -> String {
    std::env::var(PYTHON_ENV).unwrap_or_else(|_| "python3".to_string())
}

/// Directory holding the worker scripts
pub fn workers_dir() -> PathBuf {
    std::env::var(WORKERS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("workers"))
}

struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl WorkerProcess {
    /// One request/reply exchange, a JSON object per line each way
    fn request(&mut self, msg: &serde_json::Value) -> SidecarResult<serde_json::Value> {
        let mut line =
            serde_json::to_string(msg).map_err(|e| SidecarError::Protocol(e.to_string()))?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.flush()?;

        let mut reply = String::new();
        let read = self.stdout.read_line(&mut reply)?;
        if read == 0 {
            return Err(SidecarError::Protocol("worker closed stdout".to_string()));
        }
        serde_json::from_str(reply.trim())
            .map_err(|e| SidecarError::Protocol(format!("bad reply: {}", e)))
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        // best-effort shutdown, then kill
        let _ = self
            .stdin
            .write_all(b"{\"type\":\"shutdown\"}\n")
            .and_then(|_| self.stdin.flush());
        std::thread::sleep(Duration::from_millis(100));
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A managed worker script plus its (re)spawned process
pub struct SidecarWorker {
    name: String,
    interpreter: String,
    script: PathBuf,
    worker: Option<WorkerProcess>,
}

impl SidecarWorker {
    /// Worker resolved from the environment, e.g. `new("emotion_worker.py")`
    pub fn new(script_name: &str) -> Self {
        Self::with_interpreter(&python_bin(), workers_dir().join(script_name))
    }

    /// Worker with an explicit interpreter and script path
    pub fn with_interpreter(interpreter: &str, script: PathBuf) -> Self {
        let name = script
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("worker")
            .to_string();
        Self {
            name,
            interpreter: interpreter.to_string(),
            script,
            worker: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&self) -> SidecarResult<WorkerProcess> {
        log::info!(
            "sidecar: spawning {} via {}",
            self.script.display(),
            self.interpreter
        );
        let mut child = Command::new(&self.interpreter)
            .arg(&self.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SidecarError::Spawn(format!("{}: {}", self.script.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SidecarError::Spawn("no stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SidecarError::Spawn("no stdout handle".to_string()))?;

        log::info!("sidecar: {} running (pid {})", self.name, child.id());
        Ok(WorkerProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn ensure(&mut self) -> SidecarResult<&mut WorkerProcess> {
        let needs_spawn = match self.worker.as_mut() {
            Some(worker) => !worker.is_alive(),
            None => true,
        };
        if needs_spawn {
            self.worker = Some(self.spawn()?);
        }
        self.worker
            .as_mut()
            .ok_or_else(|| SidecarError::Spawn("worker unavailable".to_string()))
    }

    /// Send a request, respawning a dead worker first; a failed exchange
    /// drops the process so the next call starts a fresh one
    pub fn request(&mut self, msg: &serde_json::Value) -> SidecarResult<serde_json::Value> {
        let outcome = self.ensure()?.request(msg);
        if outcome.is_err() {
            self.worker = None;
        }
        outcome
    }

    /// Liveness probe
    pub fn ping(&mut self) -> bool {
        match self.request(&serde_json::json!({"type": "ping"})) {
            Ok(reply) => reply.get("type").and_then(|t| t.as_str()) == Some("pong"),
            Err(e) => {
                log::warn!("sidecar: {} ping failed: {}", self.name, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn script(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("worker.sh");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_request_roundtrip_and_ping() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(
            dir.path(),
            "while read line; do echo '{\"type\":\"pong\"}'; done\n",
        );
        let mut worker = SidecarWorker::with_interpreter("sh", path);

        assert!(worker.ping());
        let reply = worker
            .request(&serde_json::json!({"type": "ping"}))
            .unwrap();
        assert_eq!(reply["type"], "pong");
    }

    #[test]
    fn test_dead_worker_respawns_on_next_request() {
        let dir = tempfile::tempdir().unwrap();
        // replies once, then exits
        let path = script(dir.path(), "read line; echo '{\"type\":\"pong\"}'\n");
        let mut worker = SidecarWorker::with_interpreter("sh", path);

        assert!(worker.ping());
        // give the one-shot script time to exit, then the next exchange
        // respawns and succeeds
        std::thread::sleep(Duration::from_millis(300));
        assert!(worker.ping());
    }

    #[test]
    fn test_garbled_reply_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "while read line; do echo 'not json'; done\n");
        let mut worker = SidecarWorker::with_interpreter("sh", path);

        let err = worker
            .request(&serde_json::json!({"type": "ping"}))
            .unwrap_err();
        assert!(matches!(err, SidecarError::Protocol(_)));
    }

    #[test]
    fn test_missing_interpreter_is_spawn_error() {
        let mut worker =
            SidecarWorker::with_interpreter("definitely-not-a-binary", PathBuf::from("x.py"));
        let err = worker
            .request(&serde_json::json!({"type": "ping"}))
            .unwrap_err();
        assert!(matches!(err, SidecarError::Spawn(_)));
    }
}
