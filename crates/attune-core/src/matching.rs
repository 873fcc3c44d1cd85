//! Fuzzy matching for spoken commands
//!
//! Transcribed speech rarely matches a command phrase exactly, so every
//! candidate is scored on a 0-100 similarity scale and the best entry
//! above the caller's threshold wins. Utterances longer than a phrase are
//! additionally scored through same-width token windows, so "can you
//! pause music" still lands on "pause music".

/// A general voice command, grouped from its phrase variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    CameraOn,
    VolumeUp,
    VolumeDown,
    Pause,
    Resume,
    Next,
    Previous,
    WhatSong,
}

/// Spoken reply to the mood inquiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InquiryReply {
    /// Keep the detected mood ("vent")
    Same,
    /// Switch to calming music instead
    Change,
}

/// Recognized command phrases and the command each maps to
pub const COMMAND_PHRASES: [(&str, VoiceCommand); 23] = [
    ("camera on", VoiceCommand::CameraOn),
    ("start camera", VoiceCommand::CameraOn),
    ("begin detection", VoiceCommand::CameraOn),
    ("volume up", VoiceCommand::VolumeUp),
    ("increase volume", VoiceCommand::VolumeUp),
    ("louder", VoiceCommand::VolumeUp),
    ("volume down", VoiceCommand::VolumeDown),
    ("decrease volume", VoiceCommand::VolumeDown),
    ("softer", VoiceCommand::VolumeDown),
    ("pause", VoiceCommand::Pause),
    ("pause music", VoiceCommand::Pause),
    ("stop", VoiceCommand::Pause),
    ("stop music", VoiceCommand::Pause),
    ("play", VoiceCommand::Resume),
    ("resume", VoiceCommand::Resume),
    ("start music", VoiceCommand::Resume),
    ("next song", VoiceCommand::Next),
    ("next", VoiceCommand::Next),
    ("skip", VoiceCommand::Next),
    ("previous song", VoiceCommand::Previous),
    ("previous", VoiceCommand::Previous),
    ("go back", VoiceCommand::Previous),
    ("what song", VoiceCommand::WhatSong),
];

/// Phrases that keep the detected mood
pub const SAME_PHRASES: [&str; 5] = ["same mood", "same", "vent", "venting", "keep same"];

/// Phrases that switch the inquiry to calming music
pub const CHANGE_PHRASES: [&str; 5] = ["change mood", "change", "calm", "calm down", "help me calm"];

/// Best-scoring command for an utterance, None below `threshold`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandMatch {
    pub command: VoiceCommand,
    pub phrase: &'static str,
    pub score: u8,
}

/// Best-scoring inquiry reply for an utterance, None below `threshold`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyMatch {
    pub reply: InquiryReply,
    pub phrase: &'static str,
    pub score: u8,
}

/// Match an utterance against the general command vocabulary
pub fn match_command(text: &str, threshold: u8) -> Option<CommandMatch> {
    let text = normalize(text);
    let mut best: Option<CommandMatch> = None;
    for &(phrase, command) in COMMAND_PHRASES.iter() {
        let score = phrase_score(&text, phrase);
        if best.map_or(true, |b| score > b.score) {
            best = Some(CommandMatch {
                command,
                phrase,
                score,
            });
        }
    }
    best.filter(|b| b.score >= threshold)
}

/// Match an utterance against the inquiry reply vocabulary
pub fn match_inquiry_reply(text: &str, threshold: u8) -> Option<ReplyMatch> {
    let text = normalize(text);
    let mut best: Option<ReplyMatch> = None;
    for (phrases, reply) in [
        (&SAME_PHRASES, InquiryReply::Same),
        (&CHANGE_PHRASES, InquiryReply::Change),
    ] {
        for &phrase in phrases.iter() {
            let score = phrase_score(&text, phrase);
            if best.map_or(true, |b| score > b.score) {
                best = Some(ReplyMatch {
                    reply,
                    phrase,
                    score,
                });
            }
        }
    }
    best.filter(|b| b.score >= threshold)
}

/// First supported language mentioned anywhere in the utterance
pub fn detect_language<'a>(text: &str, languages: &'a [String]) -> Option<&'a str> {
    let text = normalize(text);
    languages
        .iter()
        .find(|lang| text.contains(lang.to_lowercase().as_str()))
        .map(|lang| lang.as_str())
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Score an utterance against a phrase, taking the best of the whole
/// string and every same-width token window
fn phrase_score(text: &str, phrase: &str) -> u8 {
    let mut best = ratio(text, phrase);
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let width = phrase.split_whitespace().count();
    if width > 0 && tokens.len() > width {
        for window in tokens.windows(width) {
            best = best.max(ratio(&window.join(" "), phrase));
        }
    }
    best
}

/// Similarity ratio on a 0-100 scale
///
/// `100 * (total - distance) / total` where the distance counts a
/// substitution as a delete plus an insert, rounded to nearest.
fn ratio(a: &str, b: &str) -> u8 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 100;
    }
    let distance = bounded_edit_distance(a, b, total);
    ((100 * (total - distance) + total / 2) / total) as u8
}

/// Edit distance capped at `max_distance`
///
/// Substitutions cost 2 so the distance stays compatible with the ratio
/// above. Returns `max_distance + 1` as soon as the running row minimum
/// proves the real distance exceeds the cap.
fn bounded_edit_distance(a: &str, b: &str, max_distance: usize) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len.abs_diff(b_len) > max_distance {
        return max_distance + 1;
    }
    if a_len == 0 {
        return b_len.min(max_distance + 1);
    }
    if b_len == 0 {
        return a_len.min(max_distance + 1);
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr: Vec<usize> = vec![0; b_len + 1];

    for i in 1..=a_len {
        curr[0] = i;
        let mut row_min = curr[0];
        for j in 1..=b_len {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 2 };
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
            row_min = row_min.min(curr[j]);
        }
        if row_min > max_distance {
            return max_distance + 1;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len].min(max_distance + 1)
}
