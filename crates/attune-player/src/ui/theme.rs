//! Theme configuration for attune-player
//!
//! Provides configurable colors for the headline, track labels, and the
//! voice status line. Configuration is stored as YAML in the user's
//! config directory. Default location: ~/.config/attune/theme.yaml

use iced::Color;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Global theme instance (initialized once at startup)
static THEME: OnceLock<ThemeConfig> = OnceLock::new();

/// Root theme configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    /// Palette for the main window
    pub palette: PaletteColors,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            palette: PaletteColors::default(),
        }
    }
}

/// Window palette configuration
///
/// Colors are specified as hex strings (e.g., "#33CC66")
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteColors {
    /// Headline color (default: purple)
    pub accent: String,
    /// Active track labels (default: green)
    pub playing: String,
    /// Voice status line (default: cyan)
    pub voice: String,
}

impl Default for PaletteColors {
    fn default() -> Self {
        Self {
            accent: "#7700EE".to_string(),  // Purple
            playing: "#33CC66".to_string(), // Green
            voice: "#00CCCC".to_string(),   // Cyan
        }
    }
}

/// Parse a hex color string to an iced Color
///
/// Supports formats: "#RRGGBB" or "RRGGBB"
/// Returns white on parse failure
fn parse_hex_color(hex: &str) -> Color {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        log::warn!("Invalid hex color '{}', using white", hex);
        return Color::WHITE;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(255);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(255);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(255);

    Color::from_rgb8(r, g, b)
}

/// Default fallback palette (matches PaletteColors::default())
const DEFAULT_ACCENT: Color = Color::from_rgb(0.47, 0.0, 0.93); // Purple (#7700EE)
const DEFAULT_PLAYING: Color = Color::from_rgb(0.2, 0.8, 0.4); // Green (#33CC66)
const DEFAULT_VOICE: Color = Color::from_rgb(0.0, 0.8, 0.8); // Cyan (#00CCCC)

/// Get the default theme file path
///
/// Returns: ~/.config/attune/theme.yaml
pub fn default_theme_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("attune")
        .join("theme.yaml")
}

/// Load theme configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_theme(path: &Path) -> ThemeConfig {
    if !path.exists() {
        log::info!("load_theme: Theme file doesn't exist, using defaults");
        return ThemeConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<ThemeConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_theme: Loaded palette - Accent: {}, Playing: {}, Voice: {}",
                    config.palette.accent,
                    config.palette.playing,
                    config.palette.voice
                );
                config
            }
            Err(e) => {
                log::warn!("load_theme: Failed to parse theme: {}, using defaults", e);
                ThemeConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "load_theme: Failed to read theme file: {}, using defaults",
                e
            );
            ThemeConfig::default()
        }
    }
}

/// Initialize the global theme from config file (call once at startup)
pub fn init_theme() {
    let path = default_theme_path();
    let config = load_theme(&path);
    if THEME.set(config).is_err() {
        log::warn!("Theme already initialized");
    }
}

/// Headline color
pub fn accent() -> Color {
    THEME
        .get()
        .map(|t| parse_hex_color(&t.palette.accent))
        .unwrap_or(DEFAULT_ACCENT)
}

/// Active track label color
pub fn playing() -> Color {
    THEME
        .get()
        .map(|t| parse_hex_color(&t.palette.playing))
        .unwrap_or(DEFAULT_PLAYING)
}

/// Voice status line color
pub fn voice() -> Color {
    THEME
        .get()
        .map(|t| parse_hex_color(&t.palette.voice))
        .unwrap_or(DEFAULT_VOICE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        let color = parse_hex_color("#FF0000");
        assert_eq!(color.r, 1.0);
        assert_eq!(color.g, 0.0);
        assert_eq!(color.b, 0.0);

        let color = parse_hex_color("00FF00");
        assert_eq!(color.r, 0.0);
        assert_eq!(color.g, 1.0);
        assert_eq!(color.b, 0.0);
    }

    #[test]
    fn test_invalid_hex_falls_back_to_white() {
        assert_eq!(parse_hex_color("nope"), Color::WHITE);
        assert_eq!(parse_hex_color("#12345"), Color::WHITE);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = ThemeConfig {
            palette: PaletteColors {
                accent: "#00FF00".to_string(),
                playing: "#FFFF00".to_string(),
                voice: "#FF0000".to_string(),
            },
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: ThemeConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.palette.accent, "#00FF00");
        assert_eq!(parsed.palette.playing, "#FFFF00");
        assert_eq!(parsed.palette.voice, "#FF0000");
    }
}
