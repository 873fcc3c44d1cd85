//! Playlist search and ranking for streaming mode
//!
//! Query building and candidate ranking are pure functions here; the
//! Web API calls live in [`client`]. A candidate survives filtering when
//! its name or description mentions at least one language keyword and
//! one emotion keyword, and the follower count then decides the winner.

pub mod client;

use crate::emotion::Emotion;
use serde::Deserialize;

/// A playlist as returned by the details endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistCandidate {
    pub id: String,
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub followers: Followers,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl PlaylistCandidate {
    /// Public web URL, when the API provided one
    pub fn url(&self) -> Option<&str> {
        self.external_urls.spotify.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Followers {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

/// A playback device known to the account
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Snapshot of what the account is currently playing
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackSnapshot {
    #[serde(default)]
    pub is_playing: bool,
    pub item: Option<TrackInfo>,
    #[serde(default)]
    pub progress_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackInfo {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
}

impl TrackInfo {
    pub fn artist_line(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub name: String,
}

/// Keywords a playlist may use for a language, industry nicknames included
pub fn language_keywords(language: &str) -> Vec<String> {
    let terms: &[&str] = match language {
        "english" => &["english", "hollywood"],
        "hindi" => &["hindi", "bollywood"],
        "malayalam" => &["malayalam", "mollywood"],
        "tamil" => &["tamil", "kollywood"],
        _ => return vec![language.to_string()],
    };
    terms.iter().map(|t| t.to_string()).collect()
}

/// Keywords a playlist may use for an emotion
pub fn emotion_keywords(emotion: Emotion) -> &'static [&'static str] {
    match emotion {
        Emotion::Happy => &["happy", "joy", "positive", "vibe", "energetic"],
        Emotion::Sad => &["sad", "melancholy", "blue", "poignant"],
        Emotion::Angry => &["angry", "rage", "furious", "aggressive"],
        Emotion::Neutral => &["neutral", "calm", "chill", "serene"],
    }
}

/// Search query variants for a language/emotion pair
pub fn build_queries(language: &str, emotion: Emotion) -> Vec<String> {
    vec![
        format!("{} {}", language, emotion),
        format!("{} {}", emotion, language),
        format!("{} {} playlist", language, emotion),
        format!("{} vibes", emotion),
    ]
}

/// Single-shot query used when every variant comes back empty
pub fn fallback_query(emotion: Emotion) -> String {
    format!("{} playlist", emotion)
}

/// Whether a playlist's text mentions the language and the emotion
pub fn matches_keywords(
    name: &str,
    description: &str,
    language_terms: &[String],
    emotion_terms: &[&str],
) -> bool {
    let text = format!("{} {}", name, description).to_lowercase();
    language_terms.iter().any(|term| text.contains(term.as_str()))
        && emotion_terms.iter().any(|term| text.contains(term))
}

/// Filter candidates by keywords and keep the most followed one
///
/// Ties keep the earliest candidate, which preserves search order.
pub fn pick_best(
    candidates: Vec<PlaylistCandidate>,
    language: &str,
    emotion: Emotion,
) -> Option<PlaylistCandidate> {
    let language_terms = language_keywords(language);
    let emotion_terms = emotion_keywords(emotion);

    let mut best: Option<PlaylistCandidate> = None;
    for candidate in candidates {
        if !matches_keywords(
            &candidate.name,
            &candidate.description,
            &language_terms,
            emotion_terms,
        ) {
            continue;
        }
        let better = best
            .as_ref()
            .map_or(true, |b| candidate.followers.total > b.followers.total);
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// First active device that actually carries an id
pub fn pick_active_device(devices: &[Device]) -> Option<&Device> {
    devices.iter().find(|d| d.is_active && d.id.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, description: &str, followers: u64) -> PlaylistCandidate {
        PlaylistCandidate {
            id: format!("id-{}", name),
            uri: format!("spotify:playlist:{}", name),
            name: name.to_string(),
            description: description.to_string(),
            followers: Followers { total: followers },
            external_urls: ExternalUrls { spotify: None },
        }
    }

    #[test]
    fn test_language_keywords_include_industry_names() {
        assert_eq!(language_keywords("hindi"), vec!["hindi", "bollywood"]);
        assert_eq!(language_keywords("tamil"), vec!["tamil", "kollywood"]);
        // unknown languages map to themselves
        assert_eq!(language_keywords("korean"), vec!["korean"]);
    }

    #[test]
    fn test_build_queries_covers_all_variants() {
        let queries = build_queries("hindi", Emotion::Happy);
        assert_eq!(
            queries,
            vec![
                "hindi happy",
                "happy hindi",
                "hindi happy playlist",
                "happy vibes"
            ]
        );
        assert_eq!(fallback_query(Emotion::Sad), "sad playlist");
    }

    #[test]
    fn test_matches_keywords_requires_both_sides() {
        let lang = language_keywords("english");
        let emo = emotion_keywords(Emotion::Happy);

        assert!(matches_keywords("Hollywood Joy Ride", "", &lang, emo));
        assert!(matches_keywords(
            "Morning Mix",
            "energetic english pop",
            &lang,
            emo
        ));
        // language only
        assert!(!matches_keywords("English Classics", "", &lang, emo));
        // emotion only
        assert!(!matches_keywords("Happy Hits", "", &lang, emo));
    }

    #[test]
    fn test_pick_best_prefers_followers_among_relevant() {
        let picked = pick_best(
            vec![
                candidate("Hindi Happy Hits", "", 500),
                candidate("Random Mix", "", 9000),
                candidate("Bollywood Joy", "", 2000),
            ],
            "hindi",
            Emotion::Happy,
        )
        .unwrap();
        // the irrelevant 9000-follower list is filtered out
        assert_eq!(picked.name, "Bollywood Joy");
    }

    #[test]
    fn test_pick_best_tie_keeps_search_order() {
        let picked = pick_best(
            vec![
                candidate("Tamil Rage", "", 100),
                candidate("Kollywood Fury", "angry beats", 100),
            ],
            "tamil",
            Emotion::Angry,
        )
        .unwrap();
        assert_eq!(picked.name, "Tamil Rage");
    }

    #[test]
    fn test_pick_best_none_when_nothing_matches() {
        assert!(pick_best(
            vec![candidate("Jazz Standards", "", 100)],
            "english",
            Emotion::Sad
        )
        .is_none());
    }

    #[test]
    fn test_pick_active_device_skips_idless_entries() {
        let devices = vec![
            Device {
                id: None,
                name: "Web".to_string(),
                is_active: true,
            },
            Device {
                id: Some("abc".to_string()),
                name: "Desk".to_string(),
                is_active: true,
            },
        ];
        assert_eq!(pick_active_device(&devices).unwrap().name, "Desk");
        assert!(pick_active_device(&[]).is_none());
    }

    #[test]
    fn test_playlist_json_shape() {
        let raw = r#"{
            "id": "37i9",
            "uri": "spotify:playlist:37i9",
            "name": "Happy English",
            "description": "feel good",
            "followers": {"total": 1234},
            "external_urls": {"spotify": "https://open.spotify.com/playlist/37i9"}
        }"#;
        let playlist: PlaylistCandidate = serde_json::from_str(raw).unwrap();
        assert_eq!(playlist.followers.total, 1234);
        assert_eq!(
            playlist.url(),
            Some("https://open.spotify.com/playlist/37i9")
        );

        // details responses may omit followers entirely
        let raw = r#"{"id": "x", "uri": "spotify:playlist:x", "name": "Bare"}"#;
        let playlist: PlaylistCandidate = serde_json::from_str(raw).unwrap();
        assert_eq!(playlist.followers.total, 0);
        assert_eq!(playlist.url(), None);
    }

    #[test]
    fn test_playback_snapshot_json_shape() {
        let raw = r#"{
            "is_playing": true,
            "progress_ms": 4200,
            "item": {
                "uri": "spotify:track:t1",
                "name": "Song One",
                "artists": [{"name": "A"}, {"name": "B"}]
            }
        }"#;
        let snapshot: PlaybackSnapshot = serde_json::from_str(raw).unwrap();
        assert!(snapshot.is_playing);
        assert_eq!(snapshot.item.as_ref().unwrap().artist_line(), "A, B");
    }
}
