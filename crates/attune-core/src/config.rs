//! Application configuration
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/attune/config.yaml
//!
//! Runtime identity (user, language, streaming tokens) comes from the
//! launch arguments, not from this file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera sampling and confidence-vote settings
    pub detection: DetectionConfig,
    /// Mood-inquiry confirmation settings
    pub inquiry: InquiryConfig,
    /// Voice command capture and matching settings
    pub voice: VoiceConfig,
    /// Local music layout and language settings
    pub playback: PlaybackConfig,
    /// Streaming Web API and companion server settings
    pub streaming: StreamingConfig,
    /// Resume/history database location
    pub storage: StorageConfig,
}

/// Detection loop configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Seconds between frame classifications while detecting
    pub analysis_interval_secs: f64,
    /// Total seconds a detection cycle collects labels before locking in
    pub detection_duration_secs: f64,
    /// Per-frame probability floor forwarded to the classifier (0.0-1.0)
    pub confidence_threshold: f64,
    /// Window share required to accept the top label
    pub accept_share: f64,
    /// Lowered share threshold applied when the top label is "sad"
    pub sad_share: f64,
    /// Cap on stored labels; oldest are evicted first
    pub window_max_hits: usize,
    /// How many camera indices to cycle through when probing
    pub camera_probe_count: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            analysis_interval_secs: 0.5,
            detection_duration_secs: 20.0,
            confidence_threshold: 0.4,
            accept_share: 0.4,
            sad_share: 0.25,
            window_max_hits: 40,
            camera_probe_count: 4,
        }
    }
}

/// Mood inquiry configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InquiryConfig {
    /// Seconds to wait for a spoken reply before falling back to neutral
    pub timeout_secs: f64,
}

impl Default for InquiryConfig {
    fn default() -> Self {
        Self { timeout_secs: 20.0 }
    }
}

/// Voice command configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Minimum similarity score (0-100) to accept a general command
    pub command_threshold: u8,
    /// Minimum similarity score (0-100) to accept an inquiry reply
    pub inquiry_threshold: u8,
    /// Seconds to wait for speech to start
    pub listen_timeout_secs: f64,
    /// Maximum seconds of a single utterance
    pub phrase_limit_secs: f64,
    /// Seconds of ambient-noise calibration at startup
    pub calibration_secs: f64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            command_threshold: 70,
            inquiry_threshold: 65,
            listen_timeout_secs: 3.0,
            phrase_limit_secs: 6.0,
            calibration_secs: 2.0,
        }
    }
}

/// Local playback configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Root of the local music tree: `<music_dir>/<language>/<emotion>/*.mp3`
    pub music_dir: PathBuf,
    /// Languages offered in the UI and recognized in voice commands
    pub supported_languages: Vec<String>,
    /// Language selected at startup when the launch arguments omit one
    pub default_language: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            music_dir: PathBuf::from("static").join("music"),
            supported_languages: vec![
                "english".to_string(),
                "malayalam".to_string(),
                "hindi".to_string(),
                "tamil".to_string(),
            ],
            default_language: "english".to_string(),
        }
    }
}

/// Streaming configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Streaming Web API base URL
    pub api_base: String,
    /// Companion dashboard base URL (resume state + player lock)
    pub backend_base: String,
    /// Playlist search page size per query variant
    pub search_limit: u32,
    /// Seconds between playback monitor polls
    pub monitor_interval_secs: f64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.spotify.com/v1".to_string(),
            backend_base: "http://127.0.0.1:5000".to_string(),
            search_limit: 15,
            monitor_interval_secs: 3.0,
        }
    }
}

/// Storage configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the history database path; None uses the platform
    /// data directory
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolved database path
    pub fn database_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }
}

/// Default history database path
///
/// Returns: ~/.local/share/attune/history.db (platform equivalent)
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("attune")
        .join("history.db")
}

/// Get the default config file path
///
/// Returns: ~/.config/attune/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("attune")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_config(path: &Path) -> AppConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return AppConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<AppConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_config: Loaded config - detection {}s @ {}s interval, music dir {:?}",
                    config.detection.detection_duration_secs,
                    config.detection.analysis_interval_secs,
                    config.playback.music_dir,
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                AppConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "load_config: Failed to read config file: {}, using defaults",
                e
            );
            AppConfig::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    log::info!("save_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: Config saved successfully");
    Ok(())
}
