//! Emotion labels shared across detection, playback, and persistence
//!
//! The classifier sidecar reports these four labels; everything downstream
//! (the confidence resolver, the playlist search, the history store) keys
//! off them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of recognized emotion categories
pub const NUM_EMOTIONS: usize = 4;

/// A decided or sampled emotion label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(usize)]
pub enum Emotion {
    Angry = 0,
    Happy = 1,
    Neutral = 2,
    Sad = 3,
}

impl Emotion {
    /// All emotions in canonical order
    pub const ALL: [Emotion; NUM_EMOTIONS] =
        [Emotion::Angry, Emotion::Happy, Emotion::Neutral, Emotion::Sad];

    /// Parse a lowercase classifier label
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "angry" => Some(Emotion::Angry),
            "happy" => Some(Emotion::Happy),
            "neutral" => Some(Emotion::Neutral),
            "sad" => Some(Emotion::Sad),
            _ => None,
        }
    }

    /// Lowercase label, matching the classifier wire format
    pub fn name(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
        }
    }

    /// Capitalized form for status labels
    pub fn title(&self) -> &'static str {
        match self {
            Emotion::Angry => "Angry",
            Emotion::Happy => "Happy",
            Emotion::Neutral => "Neutral",
            Emotion::Sad => "Sad",
        }
    }

    /// Whether this emotion requires a mood-inquiry confirmation before
    /// playback starts
    pub fn needs_inquiry(&self) -> bool {
        matches!(self, Emotion::Angry | Emotion::Sad)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_roundtrip() {
        for emotion in Emotion::ALL {
            assert_eq!(Emotion::from_label(emotion.name()), Some(emotion));
        }
        assert_eq!(Emotion::from_label("surprised"), None);
        assert_eq!(Emotion::from_label("Happy"), None); // labels are lowercase
    }

    #[test]
    fn test_inquiry_subset() {
        assert!(Emotion::Angry.needs_inquiry());
        assert!(Emotion::Sad.needs_inquiry());
        assert!(!Emotion::Happy.needs_inquiry());
        assert!(!Emotion::Neutral.needs_inquiry());
    }

    #[test]
    fn test_serde_label_format() {
        let json = serde_json::to_string(&Emotion::Sad).unwrap();
        assert_eq!(json, "\"sad\"");
        let parsed: Emotion = serde_json::from_str("\"angry\"").unwrap();
        assert_eq!(parsed, Emotion::Angry);
    }
}
