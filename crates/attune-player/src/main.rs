//! Attune - emotion-driven music player
//!
//! This is the main entry point for the GUI application. It:
//! 1. Loads configuration, opens the history database, connects audio
//! 2. Spawns the voice command thread and the vision sidecar
//! 3. Launches the iced GUI application
//!
//! ## Launch arguments (positional, all optional)
//!
//! `attune-player <user> <language> <access_token> <refresh_token> <expires_at> <is_premium>`
//!
//! The companion dashboard passes these when it spawns the player.
//! Launched by hand, the player runs as a local guest with no streaming
//! credentials.

mod ui;

use std::sync::{Arc, Mutex};

use iced::{Size, Task};

use attune_core::backend::BackendClient;
use attune_core::config;
use attune_core::player::{mpd::MpdPlayer, AudioPlayer, NullPlayer};
use attune_core::speech::WorkerTranscriber;
use attune_core::store::HistoryStore;
use attune_core::streaming::client::{StreamingAuth, StreamingClient};
use attune_core::vision::VisionEngine;
use attune_core::voice::{VoiceService, VoiceTuning};

use ui::app::AttuneApp;
use ui::message::Message;

const GUEST_USER: &str = "guest@example.com";

fn main() -> iced::Result {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("attune-player starting up");

    let config_path = config::default_config_path();
    let config = config::load_config(&config_path);

    // Identity and streaming credentials come from the dashboard launch
    let args: Vec<String> = std::env::args().skip(1).collect();
    let user = args
        .first()
        .cloned()
        .unwrap_or_else(|| GUEST_USER.to_string());
    let language = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| config.playback.default_language.clone());
    let auth = StreamingAuth {
        access_token: args.get(2).cloned().unwrap_or_default(),
        refresh_token: args.get(3).cloned().unwrap_or_default(),
        expires_at: args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0),
        is_premium: args.get(5).map(|s| s == "true").unwrap_or(false),
    };
    log::info!(
        "session: user {} language {} token {} premium {}",
        user,
        language,
        if auth.has_token() { "present" } else { "absent" },
        auth.is_premium
    );

    let store = match HistoryStore::open(&config.storage.database_path()) {
        Ok(store) => Some(store),
        Err(e) => {
            log::warn!("history database unavailable: {}", e);
            None
        }
    };

    let player: Box<dyn AudioPlayer> = match MpdPlayer::connect(&config.playback.music_dir) {
        Ok(player) => Box::new(player),
        Err(e) => {
            log::warn!("{}", e);
            log::warn!("running without local audio output");
            Box::new(NullPlayer)
        }
    };

    let voice = {
        let tuning = VoiceTuning::from_config(&config.voice, &config.playback);
        match VoiceService::spawn(Box::new(WorkerTranscriber::new()), tuning) {
            Ok(service) => Some(service),
            Err(e) => {
                log::warn!("voice service failed to start: {}", e);
                None
            }
        }
    };

    let vision = Arc::new(Mutex::new(VisionEngine::new(
        config.detection.camera_probe_count,
    )));

    let backend = match BackendClient::new(&config.streaming.backend_base, &user) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            log::warn!("companion server client unavailable: {}", e);
            None
        }
    };
    // release_lock and the camera run until the window closes
    let shutdown_backend = backend.clone();
    let shutdown_vision = Arc::clone(&vision);

    let streaming = if auth.has_token() {
        match StreamingClient::new(&config.streaming.api_base, &auth.access_token) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                log::warn!("streaming client unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Initialize theme from ~/.config/attune/theme.yaml
    ui::theme::init_theme();

    // Wrap resources in cells so the boot closure can be Fn (required by iced)
    // The boot function is only called once, but iced requires Fn for API consistency
    let config_cell = std::cell::RefCell::new(Some(config));
    let store_cell = std::cell::RefCell::new(store);
    let player_cell = std::cell::RefCell::new(Some(player));
    let voice_cell = std::cell::RefCell::new(voice);
    let backend_cell = std::cell::RefCell::new(backend);
    let streaming_cell = std::cell::RefCell::new(streaming);

    let result = iced::application(
        move || {
            let config = config_cell
                .borrow_mut()
                .take()
                .expect("config already taken");
            let player = player_cell
                .borrow_mut()
                .take()
                .expect("player already taken");
            let store = store_cell.borrow_mut().take();
            let voice = voice_cell.borrow_mut().take();
            let backend = backend_cell.borrow_mut().take();
            let streaming = streaming_cell.borrow_mut().take();

            AttuneApp::new(
                config,
                user.clone(),
                language.clone(),
                auth.clone(),
                player,
                store,
                Arc::clone(&vision),
                voice,
                backend,
                streaming,
            )
        },
        update,
        view,
    )
    .subscription(subscription)
    .theme(theme)
    .title("Attune")
    .window_size(Size::new(1000.0, 640.0))
    .run();

    // Hand the camera back and tell the dashboard the player slot is free
    if let Ok(mut engine) = shutdown_vision.lock() {
        engine.release();
    }
    if let Some(backend) = shutdown_backend {
        release_player_lock(backend);
    }

    log::info!("attune-player stopped");
    result
}

/// Best-effort lock release after the GUI runtime is gone
fn release_player_lock(backend: Arc<BackendClient>) {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => {
            if let Err(e) = runtime.block_on(backend.release_lock()) {
                log::debug!("release_lock: {}", e);
            }
        }
        Err(e) => log::warn!("release_lock: no runtime: {}", e),
    }
}

/// Update function for iced
fn update(app: &mut AttuneApp, message: Message) -> Task<Message> {
    app.update(message)
}

/// View function for iced
fn view(app: &AttuneApp) -> iced::Element<'_, Message> {
    app.view()
}

/// Subscription function for iced
fn subscription(app: &AttuneApp) -> iced::Subscription<Message> {
    app.subscription()
}

/// Theme function for iced
fn theme(app: &AttuneApp) -> iced::Theme {
    app.theme()
}
