//! Detection lifecycle state machine
//!
//! `Session` owns every transition between idle, detecting, playing and
//! the error states. It is deliberately free of I/O: the UI tick drives
//! it with the current `Instant` and translates the returned
//! [`SessionEvent`]s into camera requests, playback dispatch, speech and
//! label updates. All timing is wall clock checked per tick, so tests
//! can fabricate instants instead of sleeping.

use crate::detection::{DetectionWindow, Resolution};
use crate::emotion::Emotion;
use crate::matching::InquiryReply;
use std::time::{Duration, Instant};

/// Top-level lifecycle state; exactly one is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Idle,
    Detecting,
    Playing,
    Suggested,
    CameraError,
    AuthError,
}

/// Where playback is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicMode {
    Local,
    Streaming,
}

impl MusicMode {
    pub fn name(&self) -> &'static str {
        match self {
            MusicMode::Local => "local",
            MusicMode::Streaming => "streaming",
        }
    }
}

/// Pending mood confirmation after an angry/sad lock-in
#[derive(Debug, Clone, Copy)]
pub struct Inquiry {
    pub emotion: Emotion,
    pub started: Instant,
}

/// Timing and vote thresholds, taken from config at startup
#[derive(Debug, Clone)]
pub struct SessionTuning {
    pub analysis_interval: Duration,
    pub detection_duration: Duration,
    pub inquiry_timeout: Duration,
    pub accept_share: f64,
    pub sad_share: f64,
    pub window_max_hits: usize,
}

impl SessionTuning {
    pub fn from_config(
        detection: &crate::config::DetectionConfig,
        inquiry: &crate::config::InquiryConfig,
    ) -> Self {
        Self {
            analysis_interval: Duration::from_secs_f64(detection.analysis_interval_secs),
            detection_duration: Duration::from_secs_f64(detection.detection_duration_secs),
            inquiry_timeout: Duration::from_secs_f64(inquiry.timeout_secs),
            accept_share: detection.accept_share,
            sad_share: detection.sad_share,
            window_max_hits: detection.window_max_hits,
        }
    }
}

/// Effects a tick or transition asks the caller to perform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// Dispatch one frame classification to the vision engine
    AnalyzeFrame,
    /// Update the countdown label and progress bar
    DetectionProgress { remaining_secs: u64, progress: f32 },
    /// The window came up empty; neutral was forced
    NoFaceFallback,
    /// An emotion was locked in for this cycle
    LockedIn { emotion: Emotion },
    /// The same emotion locked twice in a row; nothing to do
    DuplicateLockSkipped { emotion: Emotion },
    /// An angry/sad lock-in opened the mood inquiry
    InquiryStarted { emotion: Emotion },
    /// No spoken reply arrived in time; neutral was substituted
    InquiryTimedOut,
    /// Run the playback selector for this emotion in the current mode
    SelectPlayback { emotion: Emotion },
}

pub struct Session {
    state: AppState,
    mode: MusicMode,
    window: DetectionWindow,
    tuning: SessionTuning,
    detection_start: Option<Instant>,
    last_analysis: Option<Instant>,
    detection_paused: bool,
    inquiry: Option<Inquiry>,
    last_locked: Option<Emotion>,
    target_emotion: Option<Emotion>,
}

impl Session {
    pub fn new(mode: MusicMode, tuning: SessionTuning) -> Self {
        let window = DetectionWindow::new(tuning.window_max_hits);
        Self {
            state: AppState::Idle,
            mode,
            window,
            tuning,
            detection_start: None,
            last_analysis: None,
            detection_paused: false,
            inquiry: None,
            last_locked: None,
            target_emotion: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn set_state(&mut self, state: AppState) {
        self.state = state;
    }

    pub fn mode(&self) -> MusicMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: MusicMode) {
        self.mode = mode;
    }

    pub fn target_emotion(&self) -> Option<Emotion> {
        self.target_emotion
    }

    pub fn last_locked(&self) -> Option<Emotion> {
        self.last_locked
    }

    pub fn inquiry_pending(&self) -> bool {
        self.inquiry.is_some()
    }

    pub fn detection_paused(&self) -> bool {
        self.detection_paused
    }

    pub fn set_detection_paused(&mut self, paused: bool) {
        self.detection_paused = paused;
    }

    /// Begin a fresh detection cycle
    ///
    /// Always clears the pending inquiry and the duplicate-lock marker.
    /// Returns false without touching anything else while in a camera or
    /// auth error state; true means the cycle started and the caller
    /// should reset its labels and stop any local playback.
    pub fn start_detection(&mut self) -> bool {
        self.inquiry = None;
        self.last_locked = None;
        if matches!(self.state, AppState::CameraError | AppState::AuthError) {
            return false;
        }
        self.detection_paused = false;
        self.window.clear();
        self.last_analysis = None;
        self.detection_start = None;
        self.target_emotion = None;
        self.state = AppState::Detecting;
        log::info!("start_detection: new cycle in {:?} mode", self.mode);
        true
    }

    /// Record one classifier label
    ///
    /// Labels are dropped while the inquiry has detection paused; late
    /// results from an earlier cycle land in the window and are flushed
    /// by the next `start_detection`. Returns whether the label was kept.
    pub fn push_label(&mut self, label: Emotion) -> bool {
        if self.detection_paused {
            return false;
        }
        self.window.push(label);
        true
    }

    /// Advance wall-clock logic by one tick
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        if self.state == AppState::Detecting && !self.detection_paused {
            let start = *self.detection_start.get_or_insert(now);
            let elapsed = now.duration_since(start);

            if elapsed >= self.tuning.detection_duration {
                let resolution = self
                    .window
                    .resolve(self.tuning.accept_share, self.tuning.sad_share);
                if resolution == Resolution::EmptyWindow {
                    events.push(SessionEvent::NoFaceFallback);
                }
                let winner = resolution.winner();
                log::info!(
                    "tick: window resolved to {} from {} samples",
                    winner,
                    self.window.len()
                );
                self.lock_in_into(winner, now, &mut events);
            } else {
                let remaining = self.tuning.detection_duration - elapsed;
                let progress = (elapsed.as_secs_f32()
                    / self.tuning.detection_duration.as_secs_f32())
                .min(1.0);
                events.push(SessionEvent::DetectionProgress {
                    remaining_secs: remaining.as_secs(),
                    progress,
                });

                let analysis_due = self
                    .last_analysis
                    .map_or(true, |t| now.duration_since(t) >= self.tuning.analysis_interval);
                if analysis_due {
                    self.last_analysis = Some(now);
                    events.push(SessionEvent::AnalyzeFrame);
                }
            }
        }

        if let Some(inquiry) = self.inquiry {
            if now.duration_since(inquiry.started) >= self.tuning.inquiry_timeout {
                log::info!("tick: inquiry timed out, defaulting to neutral");
                self.inquiry = None;
                self.target_emotion = Some(Emotion::Neutral);
                events.push(SessionEvent::InquiryTimedOut);
                events.push(SessionEvent::SelectPlayback {
                    emotion: Emotion::Neutral,
                });
                self.detection_paused = false;
            }
        }

        events
    }

    /// Commit a resolved emotion for this cycle
    pub fn lock_in(&mut self, emotion: Emotion, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        self.lock_in_into(emotion, now, &mut events);
        events
    }

    fn lock_in_into(&mut self, emotion: Emotion, now: Instant, events: &mut Vec<SessionEvent>) {
        // duplicate check runs before everything, the marker update even
        // when the state check below bails
        if self.last_locked == Some(emotion) {
            log::info!("lock_in: skipping duplicate lock for {}", emotion);
            events.push(SessionEvent::DuplicateLockSkipped { emotion });
            return;
        }
        self.last_locked = Some(emotion);

        if self.state != AppState::Detecting {
            return;
        }

        self.target_emotion = Some(emotion);
        events.push(SessionEvent::LockedIn { emotion });

        if emotion.needs_inquiry() {
            // replaces any prior pending inquiry
            self.inquiry = Some(Inquiry {
                emotion,
                started: now,
            });
            self.detection_paused = true;
            self.detection_start = None;
            events.push(SessionEvent::InquiryStarted { emotion });
            return;
        }

        events.push(SessionEvent::SelectPlayback { emotion });
    }

    /// Apply a spoken reply to the pending inquiry
    ///
    /// "same" keeps the locked emotion, "change" substitutes neutral.
    /// Detection stays paused either way; only the inquiry timeout path
    /// resumes it. Returns None when no inquiry is pending.
    pub fn resolve_inquiry(&mut self, reply: InquiryReply) -> Option<SessionEvent> {
        let inquiry = self.inquiry.take()?;
        let emotion = match reply {
            InquiryReply::Same => inquiry.emotion,
            InquiryReply::Change => Emotion::Neutral,
        };
        log::info!("resolve_inquiry: {:?} -> {}", reply, emotion);
        self.target_emotion = Some(emotion);
        Some(SessionEvent::SelectPlayback { emotion })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> SessionTuning {
        SessionTuning {
            analysis_interval: Duration::from_millis(500),
            detection_duration: Duration::from_secs(20),
            inquiry_timeout: Duration::from_secs(20),
            accept_share: 0.4,
            sad_share: 0.25,
            window_max_hits: 40,
        }
    }

    fn detecting_session() -> (Session, Instant) {
        let mut session = Session::new(MusicMode::Local, tuning());
        assert!(session.start_detection());
        let t0 = Instant::now();
        (session, t0)
    }

    #[test]
    fn test_start_detection_enters_detecting() {
        let mut session = Session::new(MusicMode::Local, tuning());
        assert_eq!(session.state(), AppState::Idle);
        assert!(session.start_detection());
        assert_eq!(session.state(), AppState::Detecting);
        assert!(!session.detection_paused());
    }

    #[test]
    fn test_start_detection_bails_in_error_states_but_clears_markers() {
        let (mut session, t0) = detecting_session();
        let events = session.lock_in(Emotion::Sad, t0);
        assert!(events.contains(&SessionEvent::InquiryStarted {
            emotion: Emotion::Sad
        }));
        session.set_state(AppState::CameraError);

        assert!(!session.start_detection());
        assert_eq!(session.state(), AppState::CameraError);
        // inquiry and dedup marker were still cleared
        assert!(!session.inquiry_pending());
        assert_eq!(session.last_locked(), None);
    }

    #[test]
    fn test_tick_emits_progress_and_paced_analysis() {
        let (mut session, t0) = detecting_session();

        let events = session.tick(t0);
        assert!(events.contains(&SessionEvent::AnalyzeFrame));
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::DetectionProgress {
                remaining_secs: 20,
                ..
            }
        )));

        // 300 ms later the interval has not elapsed
        let events = session.tick(t0 + Duration::from_millis(300));
        assert!(!events.contains(&SessionEvent::AnalyzeFrame));

        // 500 ms after the first dispatch it has
        let events = session.tick(t0 + Duration::from_millis(500));
        assert!(events.contains(&SessionEvent::AnalyzeFrame));
    }

    #[test]
    fn test_cycle_locks_in_majority_and_selects_playback() {
        let (mut session, t0) = detecting_session();
        session.tick(t0);
        for _ in 0..3 {
            session.push_label(Emotion::Happy);
        }
        session.push_label(Emotion::Neutral);

        let events = session.tick(t0 + Duration::from_secs(20));
        assert!(events.contains(&SessionEvent::LockedIn {
            emotion: Emotion::Happy
        }));
        assert!(events.contains(&SessionEvent::SelectPlayback {
            emotion: Emotion::Happy
        }));
        assert_eq!(session.target_emotion(), Some(Emotion::Happy));
        // state changes to Playing only once playback actually starts
        assert_eq!(session.state(), AppState::Detecting);
    }

    #[test]
    fn test_empty_window_falls_back_to_neutral() {
        let (mut session, t0) = detecting_session();
        session.tick(t0);

        let events = session.tick(t0 + Duration::from_secs(20));
        assert!(events.contains(&SessionEvent::NoFaceFallback));
        assert!(events.contains(&SessionEvent::LockedIn {
            emotion: Emotion::Neutral
        }));
        assert!(events.contains(&SessionEvent::SelectPlayback {
            emotion: Emotion::Neutral
        }));
    }

    #[test]
    fn test_mixed_window_vote_matches_thresholds() {
        let (mut session, t0) = detecting_session();
        session.tick(t0);
        for label in [Emotion::Sad, Emotion::Sad, Emotion::Neutral, Emotion::Happy] {
            session.push_label(label);
        }
        // sad holds 0.5, well over its lowered threshold
        let events = session.tick(t0 + Duration::from_secs(20));
        assert!(events.contains(&SessionEvent::InquiryStarted {
            emotion: Emotion::Sad
        }));

        let (mut session, t0) = detecting_session();
        session.tick(t0);
        for label in [
            Emotion::Happy,
            Emotion::Happy,
            Emotion::Sad,
            Emotion::Neutral,
            Emotion::Angry,
        ] {
            session.push_label(label);
        }
        // happy holds 0.4 exactly and wins without an inquiry
        let events = session.tick(t0 + Duration::from_secs(20));
        assert!(events.contains(&SessionEvent::SelectPlayback {
            emotion: Emotion::Happy
        }));
        assert!(!session.inquiry_pending());
    }

    #[test]
    fn test_sad_lock_in_opens_inquiry_and_pauses() {
        let (mut session, t0) = detecting_session();

        let events = session.lock_in(Emotion::Sad, t0);
        assert!(events.contains(&SessionEvent::LockedIn {
            emotion: Emotion::Sad
        }));
        assert!(events.contains(&SessionEvent::InquiryStarted {
            emotion: Emotion::Sad
        }));
        assert!(!events
            .iter()
            .any(|e| matches!(e, SessionEvent::SelectPlayback { .. })));
        assert!(session.inquiry_pending());
        assert!(session.detection_paused());
        // labels are discarded while paused
        assert!(!session.push_label(Emotion::Happy));
    }

    #[test]
    fn test_duplicate_lock_in_skipped() {
        let (mut session, t0) = detecting_session();
        session.lock_in(Emotion::Happy, t0);

        let events = session.lock_in(Emotion::Happy, t0 + Duration::from_secs(1));
        assert_eq!(
            events,
            vec![SessionEvent::DuplicateLockSkipped {
                emotion: Emotion::Happy
            }]
        );
    }

    #[test]
    fn test_non_detecting_lock_in_still_updates_marker() {
        let (mut session, t0) = detecting_session();
        session.set_state(AppState::Playing);

        let events = session.lock_in(Emotion::Happy, t0);
        assert!(events.is_empty());
        assert_eq!(session.last_locked(), Some(Emotion::Happy));
        assert_eq!(session.target_emotion(), None);

        // the marker now dedups even after detection resumes
        session.set_state(AppState::Detecting);
        let events = session.lock_in(Emotion::Happy, t0);
        assert_eq!(
            events,
            vec![SessionEvent::DuplicateLockSkipped {
                emotion: Emotion::Happy
            }]
        );
    }

    #[test]
    fn test_new_inquiry_replaces_pending_one() {
        let (mut session, t0) = detecting_session();
        session.lock_in(Emotion::Sad, t0);
        session.set_detection_paused(false);

        let events = session.lock_in(Emotion::Angry, t0 + Duration::from_secs(5));
        assert!(events.contains(&SessionEvent::InquiryStarted {
            emotion: Emotion::Angry
        }));

        // the replacement restarted the clock: "same" now keeps angry
        let event = session.resolve_inquiry(InquiryReply::Same);
        assert_eq!(
            event,
            Some(SessionEvent::SelectPlayback {
                emotion: Emotion::Angry
            })
        );
    }

    #[test]
    fn test_inquiry_voice_same_keeps_emotion_and_stays_paused() {
        let (mut session, t0) = detecting_session();
        session.lock_in(Emotion::Angry, t0);

        let event = session.resolve_inquiry(InquiryReply::Same);
        assert_eq!(
            event,
            Some(SessionEvent::SelectPlayback {
                emotion: Emotion::Angry
            })
        );
        assert!(!session.inquiry_pending());
        assert!(session.detection_paused());
        assert_eq!(session.target_emotion(), Some(Emotion::Angry));
    }

    #[test]
    fn test_inquiry_voice_change_substitutes_neutral() {
        let (mut session, t0) = detecting_session();
        session.lock_in(Emotion::Sad, t0);

        let event = session.resolve_inquiry(InquiryReply::Change);
        assert_eq!(
            event,
            Some(SessionEvent::SelectPlayback {
                emotion: Emotion::Neutral
            })
        );
        assert_eq!(session.target_emotion(), Some(Emotion::Neutral));
    }

    #[test]
    fn test_resolve_without_pending_inquiry_is_noop() {
        let (mut session, _) = detecting_session();
        assert_eq!(session.resolve_inquiry(InquiryReply::Same), None);
    }

    #[test]
    fn test_inquiry_timeout_defaults_neutral_and_resumes() {
        let (mut session, t0) = detecting_session();
        session.lock_in(Emotion::Sad, t0);

        // just before the deadline nothing happens
        let events = session.tick(t0 + Duration::from_secs(19));
        assert!(events.is_empty());

        let events = session.tick(t0 + Duration::from_secs(20));
        assert_eq!(
            events,
            vec![
                SessionEvent::InquiryTimedOut,
                SessionEvent::SelectPlayback {
                    emotion: Emotion::Neutral
                }
            ]
        );
        assert!(!session.inquiry_pending());
        assert!(!session.detection_paused());
        assert_eq!(session.target_emotion(), Some(Emotion::Neutral));
    }

    #[test]
    fn test_start_detection_resets_cycle_state() {
        let (mut session, t0) = detecting_session();
        session.push_label(Emotion::Happy);
        session.lock_in(Emotion::Happy, t0);

        assert!(session.start_detection());
        assert_eq!(session.last_locked(), None);
        assert_eq!(session.target_emotion(), None);

        // a full cycle with an empty window now falls back to neutral,
        // proving the window was flushed
        session.tick(t0 + Duration::from_secs(30));
        let events = session.tick(t0 + Duration::from_secs(50));
        assert!(events.contains(&SessionEvent::NoFaceFallback));
    }
}
