//! The 20ms heartbeat
//!
//! Each tick drains the vision and voice channels, advances the session
//! clock and applies whatever effects it asks for. Local end-of-song
//! polling runs on a coarser stride since mpc is an external process.

use std::time::Instant;

use iced::Task;

use attune_core::session::{AppState, MusicMode, SessionEvent};
use attune_core::vision::VisionOutcome;
use attune_core::voice::VoiceEvent;

use crate::ui::app::AttuneApp;
use crate::ui::message::Message;

use super::{detection, voice};

/// Ticks between local player idle checks (50 * 20ms = 1s)
const SONG_POLL_TICKS: u64 = 50;

pub fn handle(app: &mut AttuneApp) -> Task<Message> {
    app.tick_count += 1;
    let mut tasks: Vec<Task<Message>> = Vec::new();

    drain_vision(app, &mut tasks);
    drain_voice(app, &mut tasks);

    for event in app.session.tick(Instant::now()) {
        apply_session_event(app, event, &mut tasks);
    }

    if app.tick_count % SONG_POLL_TICKS == 0 {
        poll_local_song_end(app, &mut tasks);
    }

    Task::batch(tasks)
}

fn drain_vision(app: &mut AttuneApp, tasks: &mut Vec<Task<Message>>) {
    while let Ok(outcome) = app.vision_rx.try_recv() {
        match outcome {
            VisionOutcome::CameraOpened { index, ok: true } => {
                log::info!("camera {} ready", index);
                app.camera_ready = true;
                if app.session.state() == AppState::CameraError {
                    app.session.set_state(AppState::Idle);
                }
                // streaming mode waits for the account check first
                if app.session.mode() == MusicMode::Local || app.auth_verified {
                    tasks.push(detection::start(app));
                }
            }
            VisionOutcome::CameraOpened { index, ok: false } => {
                log::error!("camera {} failed to open", index);
                app.session.set_state(AppState::CameraError);
                app.status = format!("Error: Camera {} not found.", index);
                app.timer_label.clear();
                app.progress = 0.0;
            }
            VisionOutcome::Sample(Some(label)) => {
                if app.session.push_label(label) {
                    app.detected_label = format!("Detected: {}", label.title());
                }
            }
            VisionOutcome::Sample(None) => {}
            VisionOutcome::FrameReadFailed => {
                // stale failures from a superseded cycle are harmless
                if app.session.state() == AppState::Detecting {
                    app.session.set_state(AppState::CameraError);
                    app.status = "Error: Failed to get frame.".to_string();
                    app.timer_label.clear();
                    app.progress = 0.0;
                }
            }
        }
    }
}

fn drain_voice(app: &mut AttuneApp, tasks: &mut Vec<Task<Message>>) {
    let events: Vec<VoiceEvent> = match &app.voice {
        Some(service) => service.events().try_iter().collect(),
        None => return,
    };
    for event in events {
        tasks.push(voice::apply(app, event));
    }
}

fn apply_session_event(app: &mut AttuneApp, event: SessionEvent, tasks: &mut Vec<Task<Message>>) {
    match event {
        SessionEvent::AnalyzeFrame => {
            app.spawn_frame_analysis();
        }
        SessionEvent::DetectionProgress {
            remaining_secs,
            progress,
        } => {
            app.timer_label = format!("Detecting for: {}s", remaining_secs);
            app.progress = progress;
        }
        SessionEvent::NoFaceFallback => {
            app.detected_label = "Detected: No face - defaulting to Neutral".to_string();
        }
        SessionEvent::LockedIn { emotion } => {
            log::info!("locked in {}", emotion);
            app.playing_for = format!("Playing For: {}", emotion.title());
        }
        SessionEvent::DuplicateLockSkipped { emotion } => {
            log::debug!("duplicate lock on {}, skipping", emotion);
        }
        SessionEvent::InquiryStarted { emotion } => {
            app.status = format!(
                "Detected '{}'. Say 'same mood' to vent, or 'change mood' to calm down.",
                emotion
            );
            app.timer_label.clear();
            app.progress = 0.0;
            app.speaker.say(&format!(
                "Feeling {}. Say same mood to vent, or change mood to calm down.",
                emotion
            ));
            if let Some(service) = &app.voice {
                service.set_inquiry_pending(true);
            }
        }
        SessionEvent::InquiryTimedOut => {
            app.playing_for = "Playing For: Neutral (default)".to_string();
            app.status = "No reply detected. Playing calming music by default.".to_string();
            if let Some(service) = &app.voice {
                service.set_inquiry_pending(false);
            }
        }
        SessionEvent::SelectPlayback { emotion } => {
            tasks.push(super::dispatch_selection(app, emotion));
        }
    }
}

/// When a local track runs out on its own, go detect the next mood
fn poll_local_song_end(app: &mut AttuneApp, tasks: &mut Vec<Task<Message>>) {
    if app.session.mode() != MusicMode::Local || app.session.state() != AppState::Playing {
        return;
    }
    let busy = match app.player.is_busy() {
        Ok(busy) => busy,
        Err(e) => {
            log::debug!("is_busy: {}", e);
            return;
        }
    };
    if busy {
        // a manual skip shows as busy again once the next track starts
        if app.manual_skip {
            app.manual_skip = false;
        }
        return;
    }
    if app.paused || app.manual_skip || app.session.detection_paused() {
        return;
    }
    if app.tracks.is_none() {
        return;
    }
    log::info!("song finished, detecting again");
    tasks.push(detection::start(app));
}
