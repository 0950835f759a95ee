//! Saves and restores the playback session snapshot.
//!
//! The snapshot is a single JSON document holding the playlist, the current
//! track index, the playback offset and the last browsed directory. It is
//! written on bookmark and on exit, and read back once at startup.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::playlist::Track;

/// One playlist entry as it appears inside the snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTrack {
    pub title: String,
    pub source: String,
}

impl From<&Track> for StoredTrack {
    fn from(track: &Track) -> Self {
        Self {
            title: track.title.clone(),
            source: track.source.clone(),
        }
    }
}

impl From<StoredTrack> for Track {
    fn from(stored: StoredTrack) -> Self {
        Self {
            title: stored.title,
            source: stored.source,
        }
    }
}

/// Complete persisted session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub tracks: Vec<StoredTrack>,
    pub current_index: usize,
    pub offset_ms: u64,
    #[serde(default)]
    pub last_directory: Option<PathBuf>,
}

pub struct SessionStore {
    snapshot_path: PathBuf,
}

impl SessionStore {
    pub fn new() -> Self {
        let data_dir = dirs::data_dir()
            .expect("Could not find data directory")
            .join("tunedeck");

        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).expect("Could not create data directory");
        }

        Self {
            snapshot_path: data_dir.join("session.json"),
        }
    }

    /// Store backed by an explicit file path. Used by tests.
    pub fn at_path(snapshot_path: PathBuf) -> Self {
        Self { snapshot_path }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Writes the snapshot through a temporary file so an interrupted save
    /// never truncates the previous snapshot.
    pub fn save(&self, session: &StoredSession) -> Result<(), String> {
        let serialized = serde_json::to_string_pretty(session)
            .map_err(|err| format!("failed to serialize session snapshot: {}", err))?;

        let temp_path = self.snapshot_path.with_extension("json.tmp");
        std::fs::write(&temp_path, serialized)
            .map_err(|err| format!("failed to write {}: {}", temp_path.display(), err))?;
        std::fs::rename(&temp_path, &self.snapshot_path).map_err(|err| {
            format!(
                "failed to move snapshot into place at {}: {}",
                self.snapshot_path.display(),
                err
            )
        })?;

        debug!(
            "Saved session snapshot ({} tracks) to {}",
            session.tracks.len(),
            self.snapshot_path.display()
        );
        Ok(())
    }

    /// Reads the snapshot back. Returns `None` whenever there is nothing
    /// usable to restore: no file yet, unreadable contents, an empty
    /// playlist, or an index pointing outside the stored playlist.
    pub fn load(&self) -> Option<StoredSession> {
        let content = match std::fs::read_to_string(&self.snapshot_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session snapshot at {}", self.snapshot_path.display());
                return None;
            }
            Err(err) => {
                warn!(
                    "Failed to read session snapshot {}: {}",
                    self.snapshot_path.display(),
                    err
                );
                return None;
            }
        };

        let session = match serde_json::from_str::<StoredSession>(&content) {
            Ok(session) => session,
            Err(err) => {
                warn!(
                    "Discarding corrupt session snapshot {}: {}",
                    self.snapshot_path.display(),
                    err
                );
                return None;
            }
        };

        if session.tracks.is_empty() {
            debug!("Session snapshot holds no tracks; nothing to restore");
            return None;
        }

        if session.current_index >= session.tracks.len() {
            warn!(
                "Discarding session snapshot with out-of-range index {} ({} tracks)",
                session.current_index,
                session.tracks.len()
            );
            return None;
        }

        Some(session)
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionStore, StoredSession, StoredTrack};
    use std::path::PathBuf;

    fn sample_session() -> StoredSession {
        StoredSession {
            tracks: vec![
                StoredTrack {
                    title: "One".to_string(),
                    source: "/music/one.mp3".to_string(),
                },
                StoredTrack {
                    title: "Two".to_string(),
                    source: "https://radio.example/stream".to_string(),
                },
            ],
            current_index: 1,
            offset_ms: 93_000,
            last_directory: Some(PathBuf::from("/music")),
        }
    }

    #[test]
    fn test_save_then_load_round_trips_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::at_path(dir.path().join("session.json"));

        let session = sample_session();
        store.save(&session).expect("save should succeed");

        assert_eq!(store.load(), Some(session));
    }

    #[test]
    fn test_load_without_snapshot_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::at_path(dir.path().join("session.json"));

        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_corrupt_snapshot_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ this is not json").expect("write corrupt file");

        let store = SessionStore::at_path(path);
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_out_of_range_index_discards_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::at_path(dir.path().join("session.json"));

        let mut session = sample_session();
        session.current_index = 7;
        store.save(&session).expect("save should succeed");

        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_empty_snapshot_restores_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::at_path(dir.path().join("session.json"));

        let session = StoredSession {
            tracks: Vec::new(),
            current_index: 0,
            offset_ms: 0,
            last_directory: None,
        };
        store.save(&session).expect("save should succeed");

        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_save_replaces_previous_snapshot_without_leftovers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::at_path(dir.path().join("session.json"));

        store.save(&sample_session()).expect("first save");
        let mut updated = sample_session();
        updated.offset_ms = 5;
        store.save(&updated).expect("second save");

        assert_eq!(store.load(), Some(updated));
        assert!(!dir.path().join("session.json.tmp").exists());
    }
}
