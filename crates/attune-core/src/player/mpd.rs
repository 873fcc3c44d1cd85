//! MPD-backed playback through the `mpc` command-line client
//!
//! `mpc` is used instead of the raw MPD protocol: it is installed next
//! to every MPD and deals with connection details itself. MPD addresses
//! songs relative to its music directory, which must point at the same
//! tree the library scans, so paths are re-rooted before queueing.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{AudioPlayer, PlayerError, PlayerResult};

pub struct MpdPlayer {
    music_dir: PathBuf,
}

impl MpdPlayer {
    /// Probe MPD with `mpc version`; fails when mpc is missing or MPD is
    /// not running
    pub fn connect(music_dir: &Path) -> PlayerResult<Self> {
        let output = Command::new("mpc")
            .arg("version")
            .output()
            .map_err(|e| PlayerError::Unavailable(format!("mpc not runnable: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlayerError::Unavailable(format!(
                "MPD not reachable: {}",
                stderr.trim()
            )));
        }
        log::info!("MpdPlayer: connected, music dir {:?}", music_dir);
        Ok(Self {
            music_dir: music_dir.to_path_buf(),
        })
    }

    fn mpc(&self, args: &[&str]) -> PlayerResult<String> {
        let output = Command::new("mpc").args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlayerError::Command(format!(
                "mpc {}: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl AudioPlayer for MpdPlayer {
    fn play_file(&mut self, path: &Path) -> PlayerResult<()> {
        let relative = relative_to(&self.music_dir, path);
        let queued = relative
            .to_str()
            .ok_or_else(|| PlayerError::Command(format!("unplayable path {:?}", path)))?;
        self.mpc(&["clear"])?;
        self.mpc(&["add", queued])?;
        self.mpc(&["play"])?;
        log::debug!("MpdPlayer: playing {}", queued);
        Ok(())
    }

    fn pause(&mut self) -> PlayerResult<()> {
        self.mpc(&["pause"])?;
        Ok(())
    }

    fn resume(&mut self) -> PlayerResult<()> {
        self.mpc(&["play"])?;
        Ok(())
    }

    fn stop(&mut self) -> PlayerResult<()> {
        self.mpc(&["stop"])?;
        Ok(())
    }

    fn is_busy(&mut self) -> PlayerResult<bool> {
        // status shows [playing] or [paused] on the second line, or
        // neither when stopped
        let status = self.mpc(&["status"])?;
        Ok(status.contains("[playing]"))
    }

    fn adjust_volume(&mut self, delta: f64) -> PlayerResult<()> {
        let arg = volume_arg(delta);
        self.mpc(&["volume", &arg])?;
        Ok(())
    }
}

impl Drop for MpdPlayer {
    fn drop(&mut self) {
        // MPD outlives the app; stop it so music does not keep playing
        // after the window closes
        let _ = self.mpc(&["stop"]);
    }
}

/// Re-root a library path onto MPD's music directory
fn relative_to<'a>(music_dir: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(music_dir).unwrap_or(path)
}

/// mpc volume argument for a 0..1 delta: +0.1 becomes "+10"
fn volume_arg(delta: f64) -> String {
    let step = (delta * 100.0).round() as i64;
    if step >= 0 {
        format!("+{}", step)
    } else {
        step.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_to_strips_music_dir() {
        let music_dir = Path::new("static/music");
        assert_eq!(
            relative_to(music_dir, Path::new("static/music/english/happy/a.mp3")),
            Path::new("english/happy/a.mp3")
        );
        // paths outside the tree pass through untouched
        assert_eq!(
            relative_to(music_dir, Path::new("/elsewhere/b.mp3")),
            Path::new("/elsewhere/b.mp3")
        );
    }

    #[test]
    fn test_volume_arg_scales_to_percent() {
        assert_eq!(volume_arg(0.1), "+10");
        assert_eq!(volume_arg(-0.1), "-10");
        assert_eq!(volume_arg(0.0), "+0");
    }
}
