//! Camera probing and frame classification
//!
//! Wraps the emotion worker sidecar. The engine itself is synchronous;
//! the UI runs calls on short worker threads and receives
//! [`VisionOutcome`]s over a channel so a slow classifier never stalls
//! the tick loop.

use serde_json::json;
use thiserror::Error;

use crate::emotion::Emotion;
use crate::sidecar::{SidecarError, SidecarResult, SidecarWorker};

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("No working camera found")]
    CameraUnavailable,

    #[error("Failed to get frame")]
    FrameRead,

    #[error(transparent)]
    Worker(#[from] SidecarError),
}

pub type VisionResult<T> = Result<T, VisionError>;

/// Result of a background vision call, delivered over the app channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionOutcome {
    /// A camera probe finished (startup or switch)
    CameraOpened { index: u32, ok: bool },
    /// One frame classified; None when no confident face was seen
    Sample(Option<Emotion>),
    /// The camera stopped delivering frames mid-cycle
    FrameReadFailed,
}

pub struct VisionEngine {
    worker: SidecarWorker,
    camera_index: u32,
    probe_count: u32,
}

impl VisionEngine {
    pub fn new(probe_count: u32) -> Self {
        Self {
            worker: SidecarWorker::new("emotion_worker.py"),
            // index 0 is usually a built-in camera; external ones front
            // the list on the machines this ships to
            camera_index: 1,
            probe_count,
        }
    }

    pub fn camera_index(&self) -> u32 {
        self.camera_index
    }

    /// Probe indices starting at the current one until a camera opens
    ///
    /// Records and returns the working index. Worker hiccups count as
    /// failed probes so one bad index cannot sink the whole scan.
    pub fn open_camera(&mut self) -> VisionResult<u32> {
        for step in 0..self.probe_count {
            let index = (self.camera_index + step) % self.probe_count;
            match self.try_open(index) {
                Ok(true) => {
                    log::info!("open_camera: camera {} opened", index);
                    self.camera_index = index;
                    return Ok(index);
                }
                Ok(false) => {}
                Err(e) => {
                    log::warn!("open_camera: probe {} failed: {}", index, e);
                }
            }
        }
        log::error!("open_camera: no camera found in {} probes", self.probe_count);
        Err(VisionError::CameraUnavailable)
    }

    fn try_open(&mut self, index: u32) -> SidecarResult<bool> {
        let reply = self
            .worker
            .request(&json!({"type": "open", "index": index}))?;
        Ok(reply.get("ok").and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// Step to the next index and re-probe from there
    pub fn switch_camera(&mut self) -> VisionResult<u32> {
        self.camera_index = (self.camera_index + 1) % self.probe_count;
        log::info!("switch_camera: trying from index {}", self.camera_index);
        self.open_camera()
    }

    /// Classify one frame
    ///
    /// `threshold` is the per-frame probability floor the classifier
    /// applies before reporting a label. A frame-read failure is the
    /// only hard error; classifier exceptions come back as "no label"
    /// because a single bad frame should not end the cycle.
    pub fn analyze(&mut self, threshold: f64) -> VisionResult<Option<Emotion>> {
        let reply = self
            .worker
            .request(&json!({"type": "analyze", "threshold": threshold}))?;
        match reply.get("type").and_then(|t| t.as_str()) {
            Some("result") => match reply.get("label").and_then(|l| l.as_str()) {
                Some(text) => match Emotion::from_label(text) {
                    Some(emotion) => Ok(Some(emotion)),
                    None => {
                        log::warn!("analyze: unknown label {:?}", text);
                        Ok(None)
                    }
                },
                None => Ok(None),
            },
            Some("error") => {
                let reason = reply.get("reason").and_then(|r| r.as_str()).unwrap_or("");
                if reason == "read_failed" {
                    return Err(VisionError::FrameRead);
                }
                log::debug!("analyze: classifier error ignored: {}", reply);
                Ok(None)
            }
            other => Err(VisionError::Worker(SidecarError::Protocol(format!(
                "unexpected reply type {:?}",
                other
            )))),
        }
    }

    /// Release the camera held by the worker
    pub fn release(&mut self) {
        if let Err(e) = self.worker.request(&json!({"type": "release"})) {
            log::debug!("release: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn engine_with(dir: &std::path::Path, body: &str) -> VisionEngine {
        let path: PathBuf = dir.join("fake_worker.sh");
        std::fs::write(&path, body).unwrap();
        VisionEngine {
            worker: SidecarWorker::with_interpreter("sh", path),
            camera_index: 1,
            probe_count: 4,
        }
    }

    #[test]
    fn test_open_camera_probes_from_current_index() {
        let dir = tempfile::tempdir().unwrap();
        // only camera 3 opens
        let mut engine = engine_with(
            dir.path(),
            "while read line; do case \"$line\" in \
             *'\"index\":3'*) echo '{\"type\":\"opened\",\"ok\":true}' ;; \
             *'\"type\":\"open\"'*) echo '{\"type\":\"opened\",\"ok\":false}' ;; \
             *) echo '{\"type\":\"pong\"}' ;; esac; done\n",
        );

        assert_eq!(engine.open_camera().unwrap(), 3);
        assert_eq!(engine.camera_index(), 3);
    }

    #[test]
    fn test_open_camera_exhausts_all_probes() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(
            dir.path(),
            "while read line; do echo '{\"type\":\"opened\",\"ok\":false}'; done\n",
        );

        assert!(matches!(
            engine.open_camera(),
            Err(VisionError::CameraUnavailable)
        ));
    }

    #[test]
    fn test_switch_camera_steps_forward() {
        let dir = tempfile::tempdir().unwrap();
        // only camera 2 opens
        let mut engine = engine_with(
            dir.path(),
            "while read line; do case \"$line\" in \
             *'\"index\":2'*) echo '{\"type\":\"opened\",\"ok\":true}' ;; \
             *'\"type\":\"open\"'*) echo '{\"type\":\"opened\",\"ok\":false}' ;; \
             *) echo '{\"type\":\"pong\"}' ;; esac; done\n",
        );

        // from 1 the switch starts probing at 2
        assert_eq!(engine.switch_camera().unwrap(), 2);
        assert_eq!(engine.camera_index(), 2);
    }

    #[test]
    fn test_analyze_maps_labels() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(
            dir.path(),
            "while read line; do echo '{\"type\":\"result\",\"label\":\"happy\"}'; done\n",
        );
        assert_eq!(engine.analyze(0.4).unwrap(), Some(Emotion::Happy));

        let other = tempfile::tempdir().unwrap();
        let mut engine = engine_with(
            other.path(),
            "while read line; do echo '{\"type\":\"result\",\"label\":null}'; done\n",
        );
        assert_eq!(engine.analyze(0.4).unwrap(), None);
    }

    #[test]
    fn test_analyze_frame_read_failure_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(
            dir.path(),
            "while read line; do \
             echo '{\"type\":\"error\",\"reason\":\"read_failed\",\"message\":\"no frame\"}'; \
             done\n",
        );
        assert!(matches!(engine.analyze(0.4), Err(VisionError::FrameRead)));
    }

    #[test]
    fn test_analyze_classifier_error_is_no_label() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_with(
            dir.path(),
            "while read line; do \
             echo '{\"type\":\"error\",\"reason\":\"analysis\",\"message\":\"boom\"}'; \
             done\n",
        );
        assert_eq!(engine.analyze(0.4).unwrap(), None);
    }
}
