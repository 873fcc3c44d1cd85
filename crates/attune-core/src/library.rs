//! Local music library
//!
//! Songs live under `<music_dir>/<language>/<emotion>/*.mp3`. A scan
//! builds a [`TrackList`] for one language/emotion folder, falling back
//! to the english folder when the selected language has nothing for
//! that mood. The track list also carries the "previous" history stack
//! so back-navigation returns to what was actually played, not just the
//! preceding index.

use crate::emotion::Emotion;
use std::path::{Path, PathBuf};

/// Language folder used when the selected one has no songs for a mood
pub const FALLBACK_LANGUAGE: &str = "english";

/// Result of scanning the library for a language/emotion pair
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// The selected language had songs
    Found(TrackList),
    /// The selected language was empty; english substituted
    Fallback(TrackList),
    /// Neither the selected language nor english had songs
    Empty,
}

/// An ordered folder of songs plus the playback cursor
#[derive(Debug, Clone)]
pub struct TrackList {
    dir: PathBuf,
    language: String,
    files: Vec<String>,
    index: usize,
    history: Vec<String>,
}

impl TrackList {
    /// Language actually scanned, after any fallback
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// File name of the song under the cursor
    pub fn current_name(&self) -> Option<&str> {
        self.files.get(self.index).map(String::as_str)
    }

    /// Display name of the song under the cursor (file stem)
    pub fn current_stem(&self) -> Option<&str> {
        let name = self.current_name()?;
        Some(Path::new(name).file_stem().and_then(|s| s.to_str()).unwrap_or(name))
    }

    /// Full path of the song under the cursor
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current_name().map(|name| self.dir.join(name))
    }

    /// Move the cursor; out-of-range indices wrap around
    pub fn select(&mut self, index: usize) {
        if !self.files.is_empty() {
            self.index = index % self.files.len();
        }
    }

    /// A stored resume index, kept only when it is still in range
    pub fn resume_index(&self, stored: i64) -> usize {
        if stored >= 0 && (stored as usize) < self.files.len() {
            stored as usize
        } else {
            0
        }
    }

    /// Advance to the next song, remembering the current one
    pub fn advance(&mut self) {
        if self.files.is_empty() {
            return;
        }
        if let Some(name) = self.current_name() {
            self.history.push(name.to_string());
        }
        self.index = (self.index + 1) % self.files.len();
    }

    /// Step back to the previously played song
    ///
    /// Pops the history stack and jumps to that song if it still exists;
    /// with no usable history the cursor just wraps backwards.
    pub fn retreat(&mut self) {
        if self.files.is_empty() {
            return;
        }
        if let Some(name) = self.history.pop() {
            if let Some(position) = self.files.iter().position(|f| *f == name) {
                self.index = position;
                return;
            }
        }
        self.index = (self.index + self.files.len() - 1) % self.files.len();
    }
}

/// Scan the library for a language/emotion pair
pub fn scan_tracks(music_dir: &Path, language: &str, emotion: Emotion) -> ScanOutcome {
    if let Some(list) = list_songs(music_dir, language, emotion) {
        return ScanOutcome::Found(list);
    }
    if language != FALLBACK_LANGUAGE {
        if let Some(list) = list_songs(music_dir, FALLBACK_LANGUAGE, emotion) {
            log::info!(
                "scan_tracks: no {} songs for {}, falling back to {}",
                language,
                emotion,
                FALLBACK_LANGUAGE
            );
            return ScanOutcome::Fallback(list);
        }
    }
    ScanOutcome::Empty
}

fn list_songs(music_dir: &Path, language: &str, emotion: Emotion) -> Option<TrackList> {
    let dir = music_dir.join(language).join(emotion.name());
    if !dir.is_dir() {
        return None;
    }
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("list_songs: cannot read {:?}: {}", dir, e);
            return None;
        }
    };

    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let is_song = Path::new(&name)
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("mp3"));
            is_song.then_some(name)
        })
        .collect();

    if files.is_empty() {
        return None;
    }
    files.sort();

    Some(TrackList {
        dir,
        language: language.to_string(),
        files,
        index: 0,
        history: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn seed(root: &Path, language: &str, emotion: &str, names: &[&str]) {
        let dir = root.join(language).join(emotion);
        fs::create_dir_all(&dir).unwrap();
        for name in names {
            fs::write(dir.join(name), b"").unwrap();
        }
    }

    fn found(outcome: ScanOutcome) -> TrackList {
        match outcome {
            ScanOutcome::Found(list) => list,
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_sorts_and_filters_songs() {
        let root = tempfile::tempdir().unwrap();
        seed(
            root.path(),
            "english",
            "happy",
            &["b.mp3", "a.mp3", "notes.txt", "c.MP3"],
        );

        let list = found(scan_tracks(root.path(), "english", Emotion::Happy));
        assert_eq!(list.len(), 3);
        assert_eq!(list.current_name(), Some("a.mp3"));
        assert_eq!(list.current_stem(), Some("a"));
        assert!(list
            .current_path()
            .unwrap()
            .ends_with("english/happy/a.mp3"));
    }

    #[test]
    fn test_scan_falls_back_to_english() {
        let root = tempfile::tempdir().unwrap();
        seed(root.path(), "english", "sad", &["slow.mp3"]);
        // tamil folder exists but holds nothing playable
        seed(root.path(), "tamil", "sad", &["cover.jpg"]);

        match scan_tracks(root.path(), "tamil", Emotion::Sad) {
            ScanOutcome::Fallback(list) => {
                assert_eq!(list.language(), "english");
                assert_eq!(list.current_name(), Some("slow.mp3"));
            }
            other => panic!("expected Fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_empty_everywhere() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            scan_tracks(root.path(), "hindi", Emotion::Angry),
            ScanOutcome::Empty
        ));
    }

    #[test]
    fn test_select_wraps_and_resume_clamps() {
        let root = tempfile::tempdir().unwrap();
        seed(root.path(), "english", "neutral", &["a.mp3", "b.mp3", "c.mp3"]);
        let mut list = found(scan_tracks(root.path(), "english", Emotion::Neutral));

        list.select(5);
        assert_eq!(list.index(), 2);

        assert_eq!(list.resume_index(2), 2);
        assert_eq!(list.resume_index(7), 0);
        assert_eq!(list.resume_index(-1), 0);
    }

    #[test]
    fn test_advance_wraps_and_records_history() {
        let root = tempfile::tempdir().unwrap();
        seed(root.path(), "english", "happy", &["a.mp3", "b.mp3", "c.mp3"]);
        let mut list = found(scan_tracks(root.path(), "english", Emotion::Happy));

        list.advance();
        assert_eq!(list.current_name(), Some("b.mp3"));
        list.advance();
        list.advance();
        // wrapped back to the start
        assert_eq!(list.current_name(), Some("a.mp3"));
    }

    #[test]
    fn test_retreat_pops_history_before_wrapping() {
        let root = tempfile::tempdir().unwrap();
        seed(root.path(), "english", "happy", &["a.mp3", "b.mp3", "c.mp3"]);
        let mut list = found(scan_tracks(root.path(), "english", Emotion::Happy));

        // play a, jump to c, then go back: history wins over index math
        list.advance();
        list.select(2);
        list.retreat();
        assert_eq!(list.current_name(), Some("a.mp3"));

        // no history left: wrap backwards from a to c
        list.retreat();
        assert_eq!(list.current_name(), Some("c.mp3"));
    }
}
