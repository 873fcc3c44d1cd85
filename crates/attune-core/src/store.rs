//! Listening history and resume-point persistence.
//! One SQLite database holds both tables; writes happen at song-change
//! cadence so a single synchronous connection is plenty.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::emotion::Emotion;
use crate::session::MusicMode;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Where playback last stopped for one (user, language, emotion) key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    pub last_song_index: i64,
    pub last_song_name: String,
}

/// One append-only listening event
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub user: String,
    pub language: String,
    pub emotion: Emotion,
    pub mode: MusicMode,
    pub song_name: Option<String>,
    pub playlist_name: Option<String>,
}

pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    /// Open (or create) the database, creating parent directories as needed.
    pub fn open(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        let store = Self::init(conn)?;
        log::info!("HistoryStore: opened {:?}", db_path);
        Ok(store)
    }

    /// In-memory database for tests.
    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS resume_points (
                user TEXT NOT NULL,
                language TEXT NOT NULL,
                emotion TEXT NOT NULL,
                last_song_index INTEGER NOT NULL,
                last_song_name TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user, language, emotion)
            );
            CREATE TABLE IF NOT EXISTS play_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user TEXT NOT NULL,
                language TEXT NOT NULL,
                emotion TEXT NOT NULL,
                mode TEXT NOT NULL,
                song_name TEXT,
                playlist_name TEXT,
                detection_mode TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_play_history_user
                ON play_history(user, created_at);",
        )?;
        Ok(Self { conn })
    }

    /// Upsert the resume point for one (user, language, emotion) key.
    pub fn save_resume_point(
        &self,
        user: &str,
        language: &str,
        emotion: Emotion,
        index: usize,
        song_name: &str,
    ) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO resume_points
             (user, language, emotion, last_song_index, last_song_name, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user, language, emotion) DO UPDATE SET
                last_song_index = excluded.last_song_index,
                last_song_name = excluded.last_song_name,
                updated_at = excluded.updated_at",
            params![user, language, emotion.name(), index as i64, song_name, now_unix()],
        )?;
        Ok(())
    }

    /// Stored resume point, None when absent. Read failures are logged and
    /// treated as absent so playback always starts somewhere.
    pub fn load_resume_point(
        &self,
        user: &str,
        language: &str,
        emotion: Emotion,
    ) -> Option<ResumePoint> {
        let result = self
            .conn
            .query_row(
                "SELECT last_song_index, last_song_name FROM resume_points
                 WHERE user = ?1 AND language = ?2 AND emotion = ?3",
                params![user, language, emotion.name()],
                |row| {
                    Ok(ResumePoint {
                        last_song_index: row.get(0)?,
                        last_song_name: row.get(1)?,
                    })
                },
            )
            .optional();
        match result {
            Ok(point) => point,
            Err(e) => {
                log::warn!("load_resume_point: query failed: {}", e);
                None
            }
        }
    }

    /// Append one listening event.
    pub fn append_history(&self, entry: &HistoryEntry) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO play_history
             (user, language, emotion, mode, song_name, playlist_name,
              detection_mode, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.user,
                entry.language,
                entry.emotion.name(),
                entry.mode.name(),
                entry.song_name,
                entry.playlist_name,
                "camera",
                now_unix(),
            ],
        )?;
        Ok(())
    }

    /// Recent listening events for one user, newest first.
    pub fn recent_history(&self, user: &str, limit: usize) -> Vec<HistoryEntry> {
        let mut stmt = match self.conn.prepare(
            "SELECT user, language, emotion, mode, song_name, playlist_name
             FROM play_history WHERE user = ?1
             ORDER BY id DESC LIMIT ?2",
        ) {
            Ok(stmt) => stmt,
            Err(e) => {
                log::warn!("recent_history: prepare failed: {}", e);
                return Vec::new();
            }
        };

        let rows = stmt
            .query_map(params![user, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .ok();

        match rows {
            Some(iter) => iter
                .filter_map(|r| r.ok())
                .filter_map(|(user, language, emotion, mode, song_name, playlist_name)| {
                    let emotion = Emotion::from_label(&emotion)?;
                    let mode = match mode.as_str() {
                        "local" => MusicMode::Local,
                        "streaming" => MusicMode::Streaming,
                        _ => return None,
                    };
                    Some(HistoryEntry {
                        user,
                        language,
                        emotion,
                        mode,
                        song_name,
                        playlist_name,
                    })
                })
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Current time as Unix timestamp (seconds).
fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_point_roundtrip() {
        let store = HistoryStore::in_memory().unwrap();
        store
            .save_resume_point("amy@example.com", "english", Emotion::Happy, 3, "upbeat")
            .unwrap();

        let point = store
            .load_resume_point("amy@example.com", "english", Emotion::Happy)
            .unwrap();
        assert_eq!(point.last_song_index, 3);
        assert_eq!(point.last_song_name, "upbeat");
    }

    #[test]
    fn test_resume_point_upserts() {
        let store = HistoryStore::in_memory().unwrap();
        store
            .save_resume_point("amy@example.com", "hindi", Emotion::Sad, 1, "first")
            .unwrap();
        store
            .save_resume_point("amy@example.com", "hindi", Emotion::Sad, 4, "later")
            .unwrap();

        let point = store
            .load_resume_point("amy@example.com", "hindi", Emotion::Sad)
            .unwrap();
        assert_eq!(point.last_song_index, 4);
        assert_eq!(point.last_song_name, "later");
    }

    #[test]
    fn test_resume_point_keys_are_independent() {
        let store = HistoryStore::in_memory().unwrap();
        store
            .save_resume_point("amy@example.com", "english", Emotion::Happy, 2, "a")
            .unwrap();

        assert!(store
            .load_resume_point("amy@example.com", "english", Emotion::Sad)
            .is_none());
        assert!(store
            .load_resume_point("bob@example.com", "english", Emotion::Happy)
            .is_none());
    }

    #[test]
    fn test_history_appends_newest_first() {
        let store = HistoryStore::in_memory().unwrap();
        for (name, emotion) in [("one", Emotion::Neutral), ("two", Emotion::Happy)] {
            store
                .append_history(&HistoryEntry {
                    user: "amy@example.com".to_string(),
                    language: "english".to_string(),
                    emotion,
                    mode: MusicMode::Local,
                    song_name: Some(name.to_string()),
                    playlist_name: None,
                })
                .unwrap();
        }

        let rows = store.recent_history("amy@example.com", 10);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].song_name.as_deref(), Some("two"));
        assert_eq!(rows[0].emotion, Emotion::Happy);
        assert_eq!(rows[1].song_name.as_deref(), Some("one"));
    }

    #[test]
    fn test_history_streaming_rows_carry_playlist() {
        let store = HistoryStore::in_memory().unwrap();
        store
            .append_history(&HistoryEntry {
                user: "amy@example.com".to_string(),
                language: "tamil".to_string(),
                emotion: Emotion::Angry,
                mode: MusicMode::Streaming,
                song_name: None,
                playlist_name: Some("Rage Mix".to_string()),
            })
            .unwrap();

        let rows = store.recent_history("amy@example.com", 1);
        assert_eq!(rows[0].mode, MusicMode::Streaming);
        assert_eq!(rows[0].playlist_name.as_deref(), Some("Rage Mix"));
        assert!(rows[0].song_name.is_none());
    }
}
