//! Local playback dispatch and the transport buttons
//!
//! Local mode walks `<music_dir>/<language>/<emotion>` with a resume
//! point per (user, language, emotion). The transport buttons double as
//! the remote transport while a streaming device is playing.

use std::time::Duration;

use iced::Task;

use attune_core::library::{scan_tracks, ScanOutcome, TrackList};
use attune_core::session::{AppState, MusicMode};
use attune_core::store::HistoryEntry;
use attune_core::Emotion;

use crate::ui::app::AttuneApp;
use crate::ui::message::Message;

/// Enter local playback for a decided emotion
pub fn enter_local(app: &mut AttuneApp, emotion: Emotion) -> Task<Message> {
    app.session.set_state(AppState::Playing);
    app.timer_label.clear();
    app.progress = 0.0;
    app.link_url = None;
    app.transport_enabled = true;
    app.status = "Playing Music...\nSay 'camera on' to detect again.".to_string();

    match scan_tracks(&app.config.playback.music_dir, &app.language, emotion) {
        ScanOutcome::Found(list) => start_list(app, list, emotion),
        ScanOutcome::Fallback(list) => {
            app.status = format!("No songs in {}. Falling back to English.", app.language);
            start_list(app, list, emotion);
        }
        ScanOutcome::Empty => {
            log::warn!("enter_local: no songs for {} / {}", app.language, emotion);
            app.tracks = None;
            app.song_label = "None".to_string();
            app.status = "No songs found for this mood.".to_string();
        }
    }
    Task::none()
}

/// Position the cursor at the stored resume point and start playing
fn start_list(app: &mut AttuneApp, mut list: TrackList, emotion: Emotion) {
    let stored = app
        .store
        .as_ref()
        .and_then(|store| store.load_resume_point(&app.user, list.language(), emotion));
    let index = stored
        .map(|point| list.resume_index(point.last_song_index))
        .unwrap_or(0);
    list.select(index);
    app.tracks = Some(list);
    app.paused = false;
    app.manual_skip = false;
    play_current(app);
}

/// Load and play the track under the cursor, persisting the resume point
pub fn play_current(app: &mut AttuneApp) {
    let (path, stem, index, language) = {
        let Some(tracks) = app.tracks.as_ref() else {
            return;
        };
        let Some(path) = tracks.current_path() else {
            return;
        };
        let stem = tracks.current_stem().unwrap_or("Unknown").to_string();
        (path, stem, tracks.index(), tracks.language().to_string())
    };

    match app.player.play_file(&path) {
        Ok(()) => {
            app.paused = false;
            app.song_label = stem.clone();
            log::info!("play_current: {} (track {})", stem, index);

            let emotion = app.session.target_emotion().unwrap_or(Emotion::Neutral);
            if let Some(store) = &app.store {
                if let Err(e) =
                    store.save_resume_point(&app.user, &language, emotion, index, &stem)
                {
                    log::warn!("play_current: resume save failed: {}", e);
                }
                let entry = HistoryEntry {
                    user: app.user.clone(),
                    language,
                    emotion,
                    mode: MusicMode::Local,
                    song_name: Some(stem),
                    playlist_name: None,
                };
                if let Err(e) = store.append_history(&entry) {
                    log::warn!("play_current: history append failed: {}", e);
                }
            }
        }
        Err(e) => {
            log::error!("play_current: {}", e);
            app.status = format!("Playback error: {}", e);
        }
    }
}

/// Toggle pause; in streaming mode this drives the remote device
pub fn play_pause(app: &mut AttuneApp) -> Task<Message> {
    match app.session.mode() {
        MusicMode::Local => {
            let result = if app.paused {
                app.player.resume()
            } else {
                app.player.pause()
            };
            match result {
                Ok(()) => app.paused = !app.paused,
                Err(e) => log::warn!("play_pause: {}", e),
            }
            Task::none()
        }
        MusicMode::Streaming => {
            let Some(client) = app.streaming.clone() else {
                return Task::none();
            };
            if app.paused {
                app.paused = false;
                // fresh generation, re-armed once the resume has had a
                // moment to take effect
                app.monitor_generation += 1;
                let generation = app.monitor_generation;
                let delay = Duration::from_secs_f64(app.config.streaming.monitor_interval_secs);
                Task::batch([
                    Task::perform(
                        async move {
                            if let Err(e) = client.resume().await {
                                log::warn!("play_pause: resume: {}", e);
                            }
                        },
                        |_| Message::RemoteTransportDone,
                    ),
                    Task::perform(async move { tokio::time::sleep(delay).await }, move |_| {
                        Message::MonitorTick { generation }
                    }),
                ])
            } else {
                app.paused = true;
                // a deliberate pause must not read as end of playback
                app.monitor_generation += 1;
                Task::perform(
                    async move {
                        if let Err(e) = client.pause().await {
                            log::warn!("play_pause: pause: {}", e);
                        }
                    },
                    |_| Message::RemoteTransportDone,
                )
            }
        }
    }
}

/// Skip forward
pub fn next_song(app: &mut AttuneApp) -> Task<Message> {
    match app.session.mode() {
        MusicMode::Local => {
            if app.tracks.is_none() {
                return Task::none();
            }
            app.manual_skip = true;
            if let Some(tracks) = app.tracks.as_mut() {
                tracks.advance();
            }
            play_current(app);
            Task::none()
        }
        MusicMode::Streaming => remote_skip(app, true),
    }
}

/// Skip backward, preferring the history stack
pub fn previous_song(app: &mut AttuneApp) -> Task<Message> {
    match app.session.mode() {
        MusicMode::Local => {
            if app.tracks.is_none() {
                return Task::none();
            }
            app.manual_skip = true;
            if let Some(tracks) = app.tracks.as_mut() {
                tracks.retreat();
            }
            play_current(app);
            Task::none()
        }
        MusicMode::Streaming => remote_skip(app, false),
    }
}

fn remote_skip(app: &mut AttuneApp, forward: bool) -> Task<Message> {
    let Some(client) = app.streaming.clone() else {
        return Task::none();
    };
    Task::perform(
        async move {
            let result = if forward {
                client.next_track().await
            } else {
                client.previous_track().await
            };
            if let Err(e) = result {
                log::warn!("remote_skip: {}", e);
            }
        },
        |_| Message::RemoteTransportDone,
    )
}
