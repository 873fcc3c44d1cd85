//! Local audio playback
//!
//! Local mode plays files through MPD via the `mpc` command-line client
//! ([`mpd::MpdPlayer`]). The trait seam exists so the app still runs when
//! MPD is missing: [`NullPlayer`] accepts every command and just logs.

pub mod mpd;

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Audio player unavailable: {0}")]
    Unavailable(String),

    #[error("Playback command failed: {0}")]
    Command(String),

    #[error("Failed to run audio client: {0}")]
    Io(#[from] std::io::Error),
}

pub type PlayerResult<T> = Result<T, PlayerError>;

/// Transport used by local playback
pub trait AudioPlayer: Send {
    /// Load and start one file, replacing whatever was queued
    fn play_file(&mut self, path: &Path) -> PlayerResult<()>;

    fn pause(&mut self) -> PlayerResult<()>;

    fn resume(&mut self) -> PlayerResult<()>;

    fn stop(&mut self) -> PlayerResult<()>;

    /// Whether audio is audibly running; false while paused or stopped
    fn is_busy(&mut self) -> PlayerResult<bool>;

    /// Nudge the volume by a 0..1 delta, positive is louder
    fn adjust_volume(&mut self, delta: f64) -> PlayerResult<()>;
}

/// Silent stand-in when no audio backend is reachable
#[derive(Debug, Default)]
pub struct NullPlayer;

impl AudioPlayer for NullPlayer {
    fn play_file(&mut self, path: &Path) -> PlayerResult<()> {
        log::info!("NullPlayer: would play {:?}", path);
        Ok(())
    }

    fn pause(&mut self) -> PlayerResult<()> {
        Ok(())
    }

    fn resume(&mut self) -> PlayerResult<()> {
        Ok(())
    }

    fn stop(&mut self) -> PlayerResult<()> {
        Ok(())
    }

    fn is_busy(&mut self) -> PlayerResult<bool> {
        // reports busy so the end-of-song check never fires without
        // real audio behind it
        Ok(true)
    }

    fn adjust_volume(&mut self, _delta: f64) -> PlayerResult<()> {
        Ok(())
    }
}
