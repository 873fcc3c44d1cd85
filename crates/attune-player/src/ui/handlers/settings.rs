//! Mode and language switching
//!
//! The mode switch owns the streaming credential flow. The language
//! switch re-runs the playback selector in place when music is already
//! going, without restarting detection.

use std::time::{SystemTime, UNIX_EPOCH};

use iced::Task;

use attune_core::session::{AppState, MusicMode};
use attune_core::streaming::client::StreamingError;

use crate::ui::app::AttuneApp;
use crate::ui::message::Message;

use super::{detection, playback, streaming};

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Switch between local and streaming playback
pub fn set_mode(app: &mut AttuneApp, new_mode: MusicMode) -> Task<Message> {
    let current = app.session.mode();
    log::info!("set_mode: {} -> {}", current.name(), new_mode.name());
    let mut tasks = Vec::new();

    // leaving streaming orphans the monitor and quiets the remote device
    if current == MusicMode::Streaming {
        app.monitor_generation += 1;
        if let Some(client) = app.streaming.clone() {
            tasks.push(Task::perform(
                async move {
                    if let Err(e) = client.pause().await {
                        log::debug!("set_mode: pause: {}", e);
                    }
                },
                |_| Message::RemoteTransportDone,
            ));
        }
    }

    let first_selection = app.session.state() == AppState::Idle;

    if current == MusicMode::Local && new_mode != MusicMode::Local {
        if let Err(e) = app.player.stop() {
            log::warn!("set_mode: stop failed: {}", e);
        }
        app.paused = false;
        app.manual_skip = false;
    }

    if app.session.state() == AppState::AuthError && new_mode == MusicMode::Local {
        app.session.set_state(AppState::Idle);
    }

    // re-picking the active mode just restarts the cycle
    if current == new_mode && !first_selection {
        tasks.push(detection::start(app));
        return Task::batch(tasks);
    }

    app.session.set_mode(new_mode);

    if new_mode == MusicMode::Streaming {
        tasks.push(verify_streaming(app));
        if app.session.state() == AppState::AuthError || !app.auth_verified {
            // detection starts once the credential check comes back
            return Task::batch(tasks);
        }
    }

    tasks.push(detection::start(app));
    Task::batch(tasks)
}

/// Credential check on entering streaming mode
///
/// Missing or expired tokens land in AuthError immediately. Otherwise a
/// profile call runs in the background and reports back as
/// [`Message::AuthChecked`]. A token that already passed this run is
/// not re-checked.
pub fn verify_streaming(app: &mut AttuneApp) -> Task<Message> {
    if !app.auth.is_usable(now_unix()) {
        log::warn!("verify_streaming: token missing or expired");
        app.session.set_state(AppState::AuthError);
        app.status =
            "Spotify not connected.\nPlease link your account on the web dashboard.".to_string();
        app.transport_enabled = false;
        return Task::none();
    }
    if app.auth_verified {
        return Task::none();
    }
    let Some(client) = app.streaming.clone() else {
        app.session.set_state(AppState::AuthError);
        app.status = "Spotify Auth Error.\nPlease re-link on the dashboard.".to_string();
        app.transport_enabled = false;
        return Task::none();
    };
    app.status = "Checking your Spotify account...".to_string();
    Task::perform(async move { client.verify().await }, Message::AuthChecked)
}

/// Streaming credential check result
pub fn auth_checked(app: &mut AttuneApp, result: Result<(), StreamingError>) -> Task<Message> {
    match result {
        Ok(()) => {
            log::info!("auth_checked: credentials verified");
            app.auth_verified = true;
            app.status = "Spotify connected successfully!".to_string();
            if app.session.state() == AppState::AuthError {
                app.session.set_state(AppState::Idle);
            }
            if app.camera_ready && app.session.mode() == MusicMode::Streaming {
                return detection::start(app);
            }
            Task::none()
        }
        Err(e) => {
            log::warn!("auth_checked: {}", e);
            app.session.set_state(AppState::AuthError);
            app.status = "Spotify Auth Error.\nPlease re-link on the dashboard.".to_string();
            app.transport_enabled = false;
            Task::none()
        }
    }
}

/// Change the song language
pub fn set_language(app: &mut AttuneApp, language: String) -> Task<Message> {
    if language == app.language {
        return Task::none();
    }
    log::info!("set_language: {} -> {}", app.language, language);
    app.language = language;

    // music already going: re-run the selector in place
    let state = app.session.state();
    if matches!(state, AppState::Playing | AppState::Suggested) {
        if let Some(emotion) = app.session.target_emotion() {
            return match app.session.mode() {
                MusicMode::Local => playback::enter_local(app, emotion),
                MusicMode::Streaming => {
                    app.monitor_generation += 1;
                    streaming::suggest(app, emotion)
                }
            };
        }
    }
    Task::none()
}
