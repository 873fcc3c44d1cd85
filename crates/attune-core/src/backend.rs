//! Client for the companion web dashboard
//!
//! The dashboard owns account linking and the single-player lock, and it
//! stores per-playlist resume positions for streaming mode. The player
//! identifies itself with the same session cookie the dashboard issues
//! to browsers.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("Dashboard request failed: {0}")]
    Transport(String),

    #[error("Dashboard returned status {0}")]
    Status(u16),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Where a playlist last played for this user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamResumeState {
    pub track_uri: Option<String>,
    pub progress_ms: Option<u64>,
}

pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
}

impl BackendClient {
    pub fn new(base_url: &str, user: &str) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
        })
    }

    /// Resume state for a playlist; absent or unreachable both mean
    /// "start from the top"
    pub async fn fetch_resume_state(&self, playlist_id: &str) -> Option<StreamResumeState> {
        let url = format!("{}/get_spotify_state/{}", self.base_url, playlist_id);
        let response = match self
            .http
            .get(&url)
            .header("Cookie", self.session_cookie())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::warn!("fetch_resume_state: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            log::info!(
                "fetch_resume_state: no state for {} (status {})",
                playlist_id,
                response.status()
            );
            return None;
        }
        match response.json::<StreamResumeState>().await {
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!("fetch_resume_state: decode failed: {}", e);
                None
            }
        }
    }

    /// Record where a playlist is currently playing
    pub async fn log_resume_state(
        &self,
        playlist_id: &str,
        track_uri: &str,
        progress_ms: u64,
    ) -> BackendResult<()> {
        let url = format!("{}/log_spotify_state", self.base_url);
        let body = serde_json::json!({
            "playlist_id": playlist_id,
            "track_uri": track_uri,
            "progress_ms": progress_ms,
        });
        let response = self
            .http
            .post(&url)
            .header("Cookie", self.session_cookie())
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    /// Tell the dashboard this player instance is gone
    ///
    /// Called during shutdown, so the timeout is short and failures are
    /// the caller's to ignore.
    pub async fn release_lock(&self) -> BackendResult<()> {
        let url = format!("{}/release_lock", self.base_url);
        let body = serde_json::json!({ "email": self.user });
        let response = self
            .http
            .post(&url)
            .header("Cookie", self.session_cookie())
            .json(&body)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    fn session_cookie(&self) -> String {
        format!("session={}", self.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_state_json_shapes() {
        let full: StreamResumeState =
            serde_json::from_str(r#"{"track_uri": "spotify:track:t", "progress_ms": 3000}"#)
                .unwrap();
        assert_eq!(full.track_uri.as_deref(), Some("spotify:track:t"));
        assert_eq!(full.progress_ms, Some(3000));

        let empty: StreamResumeState = serde_json::from_str("{}").unwrap();
        assert!(empty.track_uri.is_none());
        assert!(empty.progress_ms.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = BackendClient::new("http://127.0.0.1:5000/", "amy@example.com").unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:5000");
        assert_eq!(client.session_cookie(), "session=amy@example.com");
    }
}
