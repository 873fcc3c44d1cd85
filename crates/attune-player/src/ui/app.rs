//! Main iced application for the Attune player
//!
//! This is the heart of the GUI. It owns:
//! - The detection lifecycle state machine and its label window
//! - Local and streaming playback state
//! - Channels from the vision worker threads and the voice thread
//! - Layout of the header, detection panel, transport and status lines

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender};
use iced::time;
use iced::widget::{button, column, container, pick_list, progress_bar, row, text, Space};
use iced::{Center, Element, Fill, Subscription, Task, Theme};

use attune_core::backend::BackendClient;
use attune_core::config::AppConfig;
use attune_core::library::TrackList;
use attune_core::player::AudioPlayer;
use attune_core::session::{MusicMode, Session, SessionTuning};
use attune_core::speech::{NativeSpeaker, Speaker};
use attune_core::store::HistoryStore;
use attune_core::streaming::client::{StreamingAuth, StreamingClient};
use attune_core::streaming::PlaylistCandidate;
use attune_core::vision::{VisionEngine, VisionError, VisionOutcome};
use attune_core::voice::VoiceService;

use super::handlers;
use super::message::Message;
use super::theme;

/// Tick cadence; label drains and countdown updates do not need more
const TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Application state
pub struct AttuneApp {
    /// Loaded configuration (timings, thresholds, paths, URLs)
    pub config: AppConfig,
    /// Detection lifecycle state machine
    pub session: Session,
    /// Account email this player was launched for
    pub user: String,
    /// Currently selected song language
    pub language: String,
    /// Streaming credentials from the launch arguments
    pub auth: StreamingAuth,

    // --- local playback ---
    /// Local audio transport (MPD, or a silent stand-in)
    pub player: Box<dyn AudioPlayer>,
    /// Scanned track list for the current language/emotion
    pub tracks: Option<TrackList>,
    /// Local pause flag (also latches remote pause in streaming mode)
    pub paused: bool,
    /// Set by manual next/previous until playback is audibly rolling again
    pub manual_skip: bool,

    // --- streaming playback ---
    pub streaming: Option<Arc<StreamingClient>>,
    pub backend: Option<Arc<BackendClient>>,
    /// Playlist chosen by the last search
    pub playlist: Option<PlaylistCandidate>,
    /// Device remote playback was started on
    pub device_id: Option<String>,
    /// Last track uri written to the companion server
    pub last_logged_track_uri: Option<String>,
    /// Bumped to orphan any in-flight monitor chain
    pub monitor_generation: u64,
    /// Credential check passed this run
    pub auth_verified: bool,

    // --- services ---
    pub store: Option<HistoryStore>,
    pub vision: Arc<Mutex<VisionEngine>>,
    pub vision_tx: Sender<VisionOutcome>,
    pub vision_rx: Receiver<VisionOutcome>,
    pub voice: Option<VoiceService>,
    pub speaker: Box<dyn Speaker>,
    /// A camera probe has succeeded since startup
    pub camera_ready: bool,

    // --- view state ---
    pub status: String,
    pub detected_label: String,
    pub playing_for: String,
    pub timer_label: String,
    pub song_label: String,
    pub voice_status: String,
    pub progress: f32,
    /// Playlist link shown to free-tier streaming users
    pub link_url: Option<String>,
    pub transport_enabled: bool,

    pub tick_count: u64,
}

impl AttuneApp {
    /// Create the application and its startup task
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        user: String,
        language: String,
        auth: StreamingAuth,
        player: Box<dyn AudioPlayer>,
        store: Option<HistoryStore>,
        vision: Arc<Mutex<VisionEngine>>,
        voice: Option<VoiceService>,
        backend: Option<Arc<BackendClient>>,
        streaming: Option<Arc<StreamingClient>>,
    ) -> (Self, Task<Message>) {
        let tuning = SessionTuning::from_config(&config.detection, &config.inquiry);
        // A launch with a token lands straight in streaming mode, the
        // dashboard's expectation; hand launches start local
        let mode = if auth.has_token() {
            MusicMode::Streaming
        } else {
            MusicMode::Local
        };
        let session = Session::new(mode, tuning);
        let (vision_tx, vision_rx) = crossbeam::channel::unbounded();

        let voice_status = if voice.is_some() {
            "Voice Command: Starting...".to_string()
        } else {
            "Voice Command: Unavailable".to_string()
        };

        let mut app = Self {
            config,
            session,
            user,
            language,
            auth,
            player,
            tracks: None,
            paused: false,
            manual_skip: false,
            streaming,
            backend,
            playlist: None,
            device_id: None,
            last_logged_track_uri: None,
            monitor_generation: 0,
            auth_verified: false,
            store,
            vision,
            vision_tx,
            vision_rx,
            voice,
            speaker: Box::new(NativeSpeaker),
            camera_ready: false,
            status: "Warming up the camera...".to_string(),
            detected_label: "Detected: ...".to_string(),
            playing_for: "Playing For: ...".to_string(),
            timer_label: String::new(),
            song_label: "None".to_string(),
            voice_status,
            progress: 0.0,
            link_url: None,
            transport_enabled: false,
            tick_count: 0,
        };

        app.spawn_camera_probe();

        let startup = match mode {
            MusicMode::Streaming => handlers::settings::verify_streaming(&mut app),
            MusicMode::Local => Task::none(),
        };
        (app, startup)
    }

    /// Update application state
    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => handlers::tick::handle(self),
            Message::SetMode(mode) => handlers::settings::set_mode(self, mode),
            Message::SetLanguage(language) => handlers::settings::set_language(self, language),
            Message::RestartDetection => handlers::detection::restart(self),
            Message::SwitchCamera => handlers::detection::switch_camera(self),
            Message::PlayPause => handlers::playback::play_pause(self),
            Message::NextSong => handlers::playback::next_song(self),
            Message::PreviousSong => handlers::playback::previous_song(self),
            Message::OpenPlaylistLink => handlers::streaming::open_playlist_link(self),
            Message::AuthChecked(result) => handlers::settings::auth_checked(self, result),
            Message::PlaylistPicked { emotion, result } => {
                handlers::streaming::playlist_picked(self, emotion, result)
            }
            Message::StreamStarted { playlist, outcome } => {
                handlers::streaming::stream_started(self, playlist, outcome)
            }
            Message::MonitorTick { generation } => {
                handlers::streaming::monitor_tick(self, generation)
            }
            Message::MonitorPolled { generation, result } => {
                handlers::streaming::monitor_polled(self, generation, result)
            }
            Message::ResumeLogged(ok) => handlers::streaming::resume_logged(self, ok),
            Message::RemoteTransportDone => Task::none(),
        }
    }

    /// Subscribe to the periodic tick
    pub fn subscription(&self) -> Subscription<Message> {
        time::every(TICK_INTERVAL).map(|_| Message::Tick)
    }

    pub fn theme(&self) -> Theme {
        Theme::Dark
    }

    /// Probe for a camera off the UI thread; the tick drain applies the outcome
    pub fn spawn_camera_probe(&self) {
        let vision = Arc::clone(&self.vision);
        let tx = self.vision_tx.clone();
        std::thread::spawn(move || {
            if let Ok(mut engine) = vision.lock() {
                let ok = engine.open_camera().is_ok();
                let _ = tx.send(VisionOutcome::CameraOpened {
                    index: engine.camera_index(),
                    ok,
                });
            }
        });
    }

    /// Step to the next camera index off the UI thread
    pub fn spawn_camera_switch(&self) {
        let vision = Arc::clone(&self.vision);
        let tx = self.vision_tx.clone();
        std::thread::spawn(move || {
            if let Ok(mut engine) = vision.lock() {
                let ok = engine.switch_camera().is_ok();
                let _ = tx.send(VisionOutcome::CameraOpened {
                    index: engine.camera_index(),
                    ok,
                });
            }
        });
    }

    /// Classify one frame off the UI thread
    ///
    /// A classifier hiccup is reported as "no label" so the cycle keeps
    /// collecting; only a frame-read failure surfaces as an error.
    pub fn spawn_frame_analysis(&self) {
        let vision = Arc::clone(&self.vision);
        let tx = self.vision_tx.clone();
        let threshold = self.config.detection.confidence_threshold;
        std::thread::spawn(move || {
            if let Ok(mut engine) = vision.lock() {
                let outcome = match engine.analyze(threshold) {
                    Ok(label) => VisionOutcome::Sample(label),
                    Err(VisionError::FrameRead) => VisionOutcome::FrameReadFailed,
                    Err(e) => {
                        log::warn!("analyze: {}", e);
                        VisionOutcome::Sample(None)
                    }
                };
                let _ = tx.send(outcome);
            }
        });
    }

    /// Build the view
    pub fn view(&self) -> Element<'_, Message> {
        let header = self.view_header();
        let detection = self.view_detection();
        let playback = self.view_playback();
        let status_bar = self.view_status();

        let content = column![header, detection, playback, status_bar]
            .spacing(24)
            .padding(20)
            .width(Fill);

        container(content).width(Fill).height(Fill).into()
    }

    /// Header: title, mode buttons, language picker, camera controls
    fn view_header(&self) -> Element<'_, Message> {
        let title = text("Attune").size(28).color(theme::accent());

        let mode = self.session.mode();
        let local_btn = button(text("Local Music"))
            .on_press(Message::SetMode(MusicMode::Local))
            .style(if mode == MusicMode::Local {
                button::primary
            } else {
                button::secondary
            });
        let streaming_btn = button(text("Online Music"))
            .on_press(Message::SetMode(MusicMode::Streaming))
            .style(if mode == MusicMode::Streaming {
                button::primary
            } else {
                button::secondary
            });

        let languages = self.config.playback.supported_languages.clone();
        let language_picker = pick_list(
            languages,
            Some(self.language.clone()),
            Message::SetLanguage,
        )
        .placeholder("Language");

        let switch_camera_btn = button(text("Switch Camera"))
            .on_press(Message::SwitchCamera)
            .style(button::secondary);
        let restart_btn = button(text("Detect Again"))
            .on_press(Message::RestartDetection)
            .style(button::secondary);

        row![
            title,
            Space::new().width(Fill),
            local_btn,
            streaming_btn,
            language_picker,
            switch_camera_btn,
            restart_btn,
        ]
        .spacing(10)
        .align_y(Center)
        .width(Fill)
        .into()
    }

    /// Detection panel: labels, countdown and progress bar
    fn view_detection(&self) -> Element<'_, Message> {
        let detected = text(&self.detected_label).size(16);
        let playing_for = text(&self.playing_for)
            .size(20)
            .color(theme::playing());
        let timer = text(&self.timer_label).size(14);
        let bar = container(progress_bar(0.0..=1.0, self.progress)).width(Fill);

        column![detected, playing_for, timer, bar]
            .spacing(8)
            .align_x(Center)
            .width(Fill)
            .into()
    }

    /// Playback panel: song label, playlist link and transport buttons
    fn view_playback(&self) -> Element<'_, Message> {
        let song = text(&self.song_label).size(18).color(theme::playing());

        let link: Element<'_, Message> = match &self.link_url {
            Some(_) => button(text("Click to open in Spotify"))
                .on_press(Message::OpenPlaylistLink)
                .style(button::primary)
                .into(),
            None => Space::new().height(0).into(),
        };

        let enabled = self.transport_enabled;
        let previous_btn = button(text("Previous"))
            .on_press_maybe(enabled.then_some(Message::PreviousSong))
            .style(button::secondary);
        let play_pause_btn = button(text(if self.paused { "Play" } else { "Pause" }))
            .on_press_maybe(enabled.then_some(Message::PlayPause))
            .style(button::primary);
        let next_btn = button(text("Next"))
            .on_press_maybe(enabled.then_some(Message::NextSong))
            .style(button::secondary);

        let transport = row![previous_btn, play_pause_btn, next_btn]
            .spacing(10)
            .align_y(Center);

        column![song, link, transport]
            .spacing(12)
            .align_x(Center)
            .width(Fill)
            .into()
    }

    /// Status lines: lifecycle status and the voice loop status
    fn view_status(&self) -> Element<'_, Message> {
        let status = text(&self.status).size(16);
        let voice = text(&self.voice_status)
            .size(14)
            .color(theme::voice());

        column![status, voice]
            .spacing(8)
            .align_x(Center)
            .width(Fill)
            .into()
    }
}
