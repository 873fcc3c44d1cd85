//! Async client for the streaming Web API
//!
//! Thin bearer-token wrapper over `reqwest`. Transport failures are
//! retried once; HTTP error statuses are not, except that a 403 carrying
//! a premium complaint gets its own variant so the caller can downgrade
//! the account flag and fall back to the link flow.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use super::{Device, PlaybackSnapshot, PlaylistCandidate};

#[derive(Error, Debug, Clone)]
pub enum StreamingError {
    #[error("Spotify request failed: {0}")]
    Transport(String),

    #[error("Spotify API returned status {0}")]
    Status(u16),

    #[error("Spotify Premium required")]
    PremiumRequired,
}

pub type StreamingResult<T> = Result<T, StreamingError>;

/// Credentials handed over on the command line by the dashboard
#[derive(Debug, Clone)]
pub struct StreamingAuth {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub is_premium: bool,
}

impl StreamingAuth {
    pub fn has_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Token present and not yet past its expiry timestamp
    ///
    /// The dashboard owns refresh; an expired token is simply unusable
    /// here.
    pub fn is_usable(&self, now_unix: i64) -> bool {
        self.has_token() && now_unix < self.expires_at
    }
}

pub struct StreamingClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl StreamingClient {
    pub fn new(base_url: &str, token: &str) -> StreamingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StreamingError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Confirm the token works by fetching the profile
    pub async fn verify(&self) -> StreamingResult<()> {
        let url = format!("{}/me", self.base_url);
        self.send(&|| self.http.get(&url)).await?;
        Ok(())
    }

    /// Playlist ids matching a search query, null items skipped
    pub async fn search_playlist_ids(
        &self,
        query: &str,
        limit: u32,
    ) -> StreamingResult<Vec<String>> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .send(&|| {
                self.http.get(&url).query(&[
                    ("q", query),
                    ("type", "playlist"),
                    ("limit", &limit.to_string()),
                ])
            })
            .await?;
        let parsed: SearchResponse = decode(response).await?;
        let ids = parsed
            .playlists
            .map(|page| {
                page.items
                    .into_iter()
                    .flatten()
                    .map(|item| item.id)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    /// Full details for one playlist
    pub async fn playlist_details(&self, id: &str) -> StreamingResult<PlaylistCandidate> {
        let url = format!("{}/playlists/{}", self.base_url, id);
        let response = self
            .send(&|| {
                self.http.get(&url).query(&[(
                    "fields",
                    "id,uri,name,description,followers,external_urls",
                )])
            })
            .await?;
        decode(response).await
    }

    /// Devices known to the account
    pub async fn devices(&self) -> StreamingResult<Vec<Device>> {
        let url = format!("{}/me/player/devices", self.base_url);
        let response = self.send(&|| self.http.get(&url)).await?;
        let parsed: DevicesResponse = decode(response).await?;
        Ok(parsed.devices)
    }

    /// Start playlist playback on a device, optionally at a resume point
    pub async fn start_playback(
        &self,
        device_id: &str,
        context_uri: &str,
        offset_uri: Option<&str>,
        position_ms: Option<u64>,
    ) -> StreamingResult<()> {
        let url = format!("{}/me/player/play", self.base_url);
        let mut body = serde_json::json!({ "context_uri": context_uri });
        if let Some(uri) = offset_uri {
            body["offset"] = serde_json::json!({ "uri": uri });
        }
        if let Some(ms) = position_ms {
            body["position_ms"] = serde_json::json!(ms);
        }
        self.send(&|| {
            self.http
                .put(&url)
                .query(&[("device_id", device_id)])
                .json(&body)
        })
        .await?;
        Ok(())
    }

    pub async fn pause(&self) -> StreamingResult<()> {
        let url = format!("{}/me/player/pause", self.base_url);
        self.send(&|| self.http.put(&url).json(&serde_json::json!({}))).await?;
        Ok(())
    }

    /// Resume the active device where it left off (no context change)
    pub async fn resume(&self) -> StreamingResult<()> {
        let url = format!("{}/me/player/play", self.base_url);
        self.send(&|| self.http.put(&url).json(&serde_json::json!({}))).await?;
        Ok(())
    }

    pub async fn next_track(&self) -> StreamingResult<()> {
        let url = format!("{}/me/player/next", self.base_url);
        self.send(&|| self.http.post(&url)).await?;
        Ok(())
    }

    pub async fn previous_track(&self) -> StreamingResult<()> {
        let url = format!("{}/me/player/previous", self.base_url);
        self.send(&|| self.http.post(&url)).await?;
        Ok(())
    }

    /// What the account is playing right now; None when nothing is
    pub async fn current_playback(&self) -> StreamingResult<Option<PlaybackSnapshot>> {
        let url = format!("{}/me/player", self.base_url);
        let response = self.send(&|| self.http.get(&url)).await?;
        if response.status().as_u16() == 204 {
            return Ok(None);
        }
        let text = response
            .text()
            .await
            .map_err(|e| StreamingError::Transport(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StreamingError::Transport(format!("decode failed: {}", e)))
    }

    /// Send with one retry on transport failure
    async fn send(
        &self,
        make: &(dyn Fn() -> reqwest::RequestBuilder + Sync),
    ) -> StreamingResult<reqwest::Response> {
        let mut last_error = String::new();
        for attempt in 1..=2 {
            match make().bearer_auth(&self.token).send().await {
                Ok(response) => return check_status(response).await,
                Err(e) => {
                    log::warn!("spotify: request failed (attempt {}): {}", attempt, e);
                    last_error = e.to_string();
                    if attempt == 1 {
                        tokio::time::sleep(Duration::from_millis(300)).await;
                    }
                }
            }
        }
        Err(StreamingError::Transport(last_error))
    }
}

async fn check_status(response: reqwest::Response) -> StreamingResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    log::warn!("spotify: status {} body {}", code, body);
    if code == 403 && body.to_lowercase().contains("premium") {
        return Err(StreamingError::PremiumRequired);
    }
    Err(StreamingError::Status(code))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> StreamingResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| StreamingError::Transport(format!("decode failed: {}", e)))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    playlists: Option<Page<SearchItem>>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    items: Vec<Option<T>>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
}
