//! Streaming playlist selection and the playback monitor
//!
//! The selector searches, filters and ranks playlist candidates for the
//! current language and emotion. Premium accounts get remote playback on
//! their active device plus a polling monitor; free accounts get a
//! clickable playlist link. All of it runs as async tasks so the tick
//! loop never blocks on the network.

use std::sync::Arc;
use std::time::Duration;

use iced::Task;

use attune_core::backend::BackendClient;
use attune_core::session::{AppState, MusicMode};
use attune_core::store::HistoryEntry;
use attune_core::streaming::client::{StreamingClient, StreamingError};
use attune_core::streaming::{
    build_queries, fallback_query, pick_active_device, pick_best, PlaybackSnapshot,
    PlaylistCandidate,
};
use attune_core::Emotion;

use crate::ui::app::AttuneApp;
use crate::ui::message::{Message, StreamStartOutcome};

use super::detection;

/// Kick off the playlist search for a decided emotion
pub fn suggest(app: &mut AttuneApp, emotion: Emotion) -> Task<Message> {
    app.session.set_state(AppState::Suggested);
    app.timer_label.clear();
    app.progress = 0.0;
    app.link_url = None;
    app.song_label = "Searching for the perfect playlist...".to_string();
    app.status = "Looking for music that fits your mood.".to_string();

    let Some(client) = app.streaming.clone() else {
        app.song_label = "Spotify Search Error".to_string();
        return Task::none();
    };
    let language = app.language.clone();
    let limit = app.config.streaming.search_limit;
    Task::perform(
        async move { pick_playlist(client, language, emotion, limit).await },
        move |result| Message::PlaylistPicked { emotion, result },
    )
}

/// Search, filter and rank playlist candidates for language + emotion
async fn pick_playlist(
    client: Arc<StreamingClient>,
    language: String,
    emotion: Emotion,
    limit: u32,
) -> Result<Option<PlaylistCandidate>, StreamingError> {
    let mut ids: Vec<String> = Vec::new();
    for query in build_queries(&language, emotion) {
        for id in client.search_playlist_ids(&query, limit).await? {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    log::info!("pick_playlist: {} candidate ids", ids.len());

    let mut candidates = Vec::new();
    for id in &ids {
        match client.playlist_details(id).await {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => log::debug!("pick_playlist: details for {} skipped: {}", id, e),
        }
    }

    if let Some(best) = pick_best(candidates, &language, emotion) {
        return Ok(Some(best));
    }

    // unfiltered single-hit fallback on the emotion alone
    let ids = client.search_playlist_ids(&fallback_query(emotion), 1).await?;
    match ids.first() {
        Some(id) => Ok(client.playlist_details(id).await.ok()),
        None => Ok(None),
    }
}

/// Apply the playlist search result
pub fn playlist_picked(
    app: &mut AttuneApp,
    emotion: Emotion,
    result: Result<Option<PlaylistCandidate>, StreamingError>,
) -> Task<Message> {
    // the search may outlive a mode switch
    if app.session.mode() != MusicMode::Streaming {
        return Task::none();
    }
    match result {
        Err(e) => {
            log::warn!("playlist_picked: {}", e);
            app.song_label = "Spotify Search Error".to_string();
            Task::none()
        }
        Ok(None) => {
            app.song_label = format!(
                "No relevant playlist found for '{} {}'.",
                app.language, emotion
            );
            Task::none()
        }
        Ok(Some(playlist)) => {
            log::info!(
                "playlist_picked: {} ({} followers)",
                playlist.name,
                playlist.followers.total
            );
            app.playlist = Some(playlist.clone());
            if app.auth.is_premium {
                start_streaming_playback(app, playlist)
            } else {
                app.song_label = playlist.name.clone();
                enter_free_link(app, &playlist);
                Task::none()
            }
        }
    }
}

/// Premium path: start the playlist on the user's active device
fn start_streaming_playback(app: &mut AttuneApp, playlist: PlaylistCandidate) -> Task<Message> {
    let Some(client) = app.streaming.clone() else {
        return Task::none();
    };
    let backend = app.backend.clone();
    app.status = "Starting playback on your device...".to_string();
    Task::perform(
        async move {
            let outcome = start_on_device(client, backend, &playlist).await;
            (playlist, outcome)
        },
        |(playlist, outcome)| Message::StreamStarted { playlist, outcome },
    )
}

/// Find an active device and start the playlist on it, resuming where the
/// companion server last saw this playlist
async fn start_on_device(
    client: Arc<StreamingClient>,
    backend: Option<Arc<BackendClient>>,
    playlist: &PlaylistCandidate,
) -> StreamStartOutcome {
    let devices = match client.devices().await {
        Ok(devices) => devices,
        Err(e) => return StreamStartOutcome::Failed(e),
    };
    let Some(device_id) = pick_active_device(&devices).and_then(|d| d.id.clone()) else {
        return StreamStartOutcome::NoDevice;
    };

    let resume = match &backend {
        Some(backend) => backend.fetch_resume_state(&playlist.id).await,
        None => None,
    };
    let (offset_uri, position_ms) = match resume {
        Some(state) => (state.track_uri, state.progress_ms),
        None => (None, None),
    };

    match client
        .start_playback(&device_id, &playlist.uri, offset_uri.as_deref(), position_ms)
        .await
    {
        Ok(()) => StreamStartOutcome::Started { device_id },
        Err(e) => StreamStartOutcome::Failed(e),
    }
}

/// Apply the outcome of the remote start attempt
pub fn stream_started(
    app: &mut AttuneApp,
    playlist: PlaylistCandidate,
    outcome: StreamStartOutcome,
) -> Task<Message> {
    if app.session.mode() != MusicMode::Streaming {
        return Task::none();
    }
    match outcome {
        StreamStartOutcome::Started { device_id } => {
            log::info!("stream_started: {} on device {}", playlist.name, device_id);
            app.session.set_state(AppState::Playing);
            app.device_id = Some(device_id);
            app.paused = false;
            app.status = "Playing on Spotify...".to_string();
            app.transport_enabled = true;
            app.last_logged_track_uri = None;
            app.monitor_generation += 1;
            let generation = app.monitor_generation;
            Task::done(Message::MonitorTick { generation })
        }
        StreamStartOutcome::NoDevice => {
            log::warn!("stream_started: no active device");
            app.song_label = "No active Spotify device found!".to_string();
            app.status =
                "Please start playing Spotify on one of\nyour devices, then try again.".to_string();
            Task::none()
        }
        StreamStartOutcome::Failed(StreamingError::PremiumRequired) => {
            log::warn!("stream_started: premium required, downgrading");
            app.song_label = "Playback failed: Spotify Premium required.".to_string();
            app.auth.is_premium = false;
            enter_free_link(app, &playlist);
            Task::none()
        }
        StreamStartOutcome::Failed(e) => {
            log::warn!("stream_started: {}", e);
            app.song_label = format!("Spotify error: {}", e);
            Task::none()
        }
    }
}

/// Free-tier path: history row plus a clickable link, transport off
///
/// Leaves the song label alone so a premium failure message stays
/// visible above the link.
fn enter_free_link(app: &mut AttuneApp, playlist: &PlaylistCandidate) {
    app.session.set_state(AppState::Suggested);
    app.status = "Playlist Suggested!\nSay 'camera on' to detect again.".to_string();
    app.link_url = playlist.url().map(str::to_string);
    app.transport_enabled = false;
    append_stream_history(app, None, Some(playlist.name.clone()));
}

fn append_stream_history(
    app: &mut AttuneApp,
    song_name: Option<String>,
    playlist_name: Option<String>,
) {
    let Some(store) = &app.store else {
        return;
    };
    let emotion = app.session.target_emotion().unwrap_or(Emotion::Neutral);
    let entry = HistoryEntry {
        user: app.user.clone(),
        language: app.language.clone(),
        emotion,
        mode: MusicMode::Streaming,
        song_name,
        playlist_name,
    };
    if let Err(e) = store.append_history(&entry) {
        log::warn!("append_stream_history: {}", e);
    }
}

/// Poll remote playback if this monitor chain is still current
pub fn monitor_tick(app: &mut AttuneApp, generation: u64) -> Task<Message> {
    if generation != app.monitor_generation {
        return Task::none();
    }
    let Some(client) = app.streaming.clone() else {
        return Task::none();
    };
    Task::perform(async move { client.current_playback().await }, move |result| {
        Message::MonitorPolled { generation, result }
    })
}

/// Apply one monitor poll: track labels, resume logging, end-of-playback
pub fn monitor_polled(
    app: &mut AttuneApp,
    generation: u64,
    result: Result<Option<PlaybackSnapshot>, StreamingError>,
) -> Task<Message> {
    if generation != app.monitor_generation {
        return Task::none();
    }
    match result {
        Err(e) => {
            // the monitor dies on request errors; re-detection revives it
            log::warn!("monitor_polled: {}", e);
            Task::none()
        }
        Ok(Some(snapshot)) if snapshot.is_playing => {
            let mut log_task = Task::none();
            if let Some(track) = &snapshot.item {
                app.song_label = format!("{}\nby {}", track.name, track.artist_line());
                if app.last_logged_track_uri.as_deref() != Some(track.uri.as_str()) {
                    app.last_logged_track_uri = Some(track.uri.clone());
                    let track_name = track.name.clone();
                    let track_uri = track.uri.clone();
                    let progress_ms = snapshot.progress_ms;
                    let playlist_name = app.playlist.as_ref().map(|p| p.name.clone());
                    append_stream_history(app, Some(track_name), playlist_name);
                    if let (Some(backend), Some(playlist)) =
                        (app.backend.clone(), app.playlist.as_ref())
                    {
                        let playlist_id = playlist.id.clone();
                        log_task = Task::perform(
                            async move {
                                backend
                                    .log_resume_state(&playlist_id, &track_uri, progress_ms)
                                    .await
                                    .is_ok()
                            },
                            Message::ResumeLogged,
                        );
                    }
                }
            }
            let delay = Duration::from_secs_f64(app.config.streaming.monitor_interval_secs);
            let rearm = Task::perform(async move { tokio::time::sleep(delay).await }, move |_| {
                Message::MonitorTick { generation }
            });
            Task::batch([log_task, rearm])
        }
        Ok(_) => {
            // stopped, or nothing on the account: back to detection
            log::info!("monitor_polled: remote playback ended");
            app.monitor_generation += 1;
            detection::start(app)
        }
    }
}

/// Companion server resume write finished
pub fn resume_logged(_app: &mut AttuneApp, ok: bool) -> Task<Message> {
    if !ok {
        log::debug!("resume_logged: companion server write failed");
    }
    Task::none()
}

/// Open the suggested playlist in the system browser
pub fn open_playlist_link(app: &mut AttuneApp) -> Task<Message> {
    let Some(url) = app.link_url.clone() else {
        return Task::none();
    };
    log::info!("open_playlist_link: {}", url);
    if let Err(e) = open_in_browser(&url) {
        log::warn!("open_playlist_link: {}", e);
        app.status = "Could not open the browser.".to_string();
    }
    Task::none()
}

#[cfg(target_os = "macos")]
fn open_in_browser(url: &str) -> std::io::Result<()> {
    std::process::Command::new("open").arg(url).spawn()?;
    Ok(())
}

#[cfg(target_os = "windows")]
fn open_in_browser(url: &str) -> std::io::Result<()> {
    // the empty argument is the window title
    std::process::Command::new("cmd")
        .args(["/c", "start", "", url])
        .spawn()?;
    Ok(())
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn open_in_browser(url: &str) -> std::io::Result<()> {
    std::process::Command::new("xdg-open").arg(url).spawn()?;
    Ok(())
}
