//! Detection cycle control
//!
//! Starting a cycle resets the whole playback surface. The lifecycle
//! machine decides whether the start is allowed at all; camera and auth
//! error states reject it until the underlying problem is cleared.

use iced::Task;

use attune_core::session::MusicMode;

use crate::ui::app::AttuneApp;
use crate::ui::message::Message;

/// Begin a fresh detection cycle
pub fn start(app: &mut AttuneApp) -> Task<Message> {
    if !app.session.start_detection() {
        return Task::none();
    }

    // any in-flight monitor chain is stale from here on
    app.monitor_generation += 1;
    app.playlist = None;
    app.last_logged_track_uri = None;

    if app.session.mode() == MusicMode::Local {
        if let Err(e) = app.player.stop() {
            log::warn!("start: stop failed: {}", e);
        }
        app.paused = false;
        app.manual_skip = false;
    }

    app.link_url = None;
    app.transport_enabled = true;
    app.detected_label = "Detected: Detecting...".to_string();
    app.playing_for = "Playing For: ...".to_string();
    app.song_label = "None".to_string();
    app.timer_label.clear();
    app.progress = 0.0;
    app.status = "Detecting your mood...".to_string();
    if let Some(voice) = &app.voice {
        voice.set_inquiry_pending(false);
    }
    Task::none()
}

/// Toolbar restart button
pub fn restart(app: &mut AttuneApp) -> Task<Message> {
    start(app)
}

/// Step to the next camera index and re-probe
///
/// The probe itself runs on a worker thread; the tick drain applies the
/// outcome, clearing or re-entering the camera error state.
pub fn switch_camera(app: &mut AttuneApp) -> Task<Message> {
    app.status = "Switching camera...".to_string();
    app.spawn_camera_switch();
    Task::none()
}
