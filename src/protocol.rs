//! Event-bus protocol shared by all runtime components.
//!
//! This module defines all message payloads exchanged between the session
//! manager, the media backend, background resolvers, and the shell.

use std::path::PathBuf;

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Library(LibraryMessage),
    Playlist(PlaylistMessage),
    Playback(PlaybackMessage),
    Session(SessionMessage),
    Backend(BackendMessage),
    Metadata(MetadataMessage),
}

/// Advance policy applied when moving past the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceMode {
    Continuous, // Next track in order, wrapping at the end
    Shuffle,    // Pick a random track each time
}

/// Session-owned playback state reported to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
}

/// Raw state vocabulary reported by a media backend's poll thread.
/// The session manager interprets these; they never reach the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawPlaybackState {
    Opening,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

/// Classified failure conditions surfaced as `SessionMessage::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    EmptyPlaylist,
    IndexOutOfRange,
    AccessDenied,
    DirectoryNotFound,
    ScanFailed,
    MediaUnresolvable,
}

/// One scanned directory: sub-directories first, then playable files.
/// Both lists hold full paths in sorted order; display names (including the
/// synthesized `"..."` parent entry) are derived by the accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryListing {
    pub directory: PathBuf,
    pub directories: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

impl LibraryListing {
    /// Display names for the directory pane, parent sentinel first.
    pub fn directory_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.directories.len() + 1);
        names.push("...".to_string());
        names.extend(self.directories.iter().map(|path| entry_name(path)));
        names
    }

    /// Display names for the file pane.
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|path| entry_name(path)).collect()
    }
}

fn entry_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Library-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum LibraryMessage {
    /// Rescan and switch browsing to the given directory.
    Navigate(PathBuf),
    /// Resolve the parent sentinel; no-op when already at a filesystem root.
    NavigateUp,
    ListingChanged(LibraryListing),
}

/// Playlist-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum PlaylistMessage {
    /// Append every playable file of the current listing.
    AddAllListed,
    AddRemoteTrack(String),
    Clear,
    /// Current playlist contents for rendering, by display title.
    Changed { titles: Vec<String> },
}

/// Playback-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum PlaybackMessage {
    PlayCurrent,
    PlayAt(usize),
    TogglePause,
    Skip,
    SetMode(AdvanceMode),
    TrackChanged {
        title: String,
        artist: String,
    },
    Progress {
        elapsed_ms: u64,
        total_ms: u64,
        /// `elapsed_ms / total_ms`, or 0.0 when the total is unknown.
        fraction: f32,
    },
    StateChanged(PlaybackState),
    ModeChanged(AdvanceMode),
}

/// Session lifecycle commands and notifications.
#[derive(Debug, Clone)]
pub enum SessionMessage {
    /// Pause playback and persist the session snapshot.
    Bookmark,
    /// Persist the session snapshot and shut the session manager down.
    Exit,
    Saved {
        track_count: usize,
    },
    Error {
        kind: SessionErrorKind,
        message: String,
    },
}

/// Events posted by the media backend's poll thread and by the session
/// manager's remote-media resolver.
#[derive(Debug, Clone)]
pub enum BackendMessage {
    Tick {
        elapsed_ms: u64,
        total_ms: u64,
    },
    StateObserved(RawPlaybackState),
    /// Remote media fetched and probed off-thread; `epoch` guards staleness.
    RemoteMediaReady {
        epoch: u64,
        bytes: Vec<u8>,
        title: String,
        artist: String,
    },
    RemoteMediaFailed {
        epoch: u64,
        message: String,
    },
}

/// Completion of an asynchronous tag read for a local track.
#[derive(Debug, Clone)]
pub enum MetadataMessage {
    /// Empty strings mean the tag was absent.
    Resolved {
        epoch: u64,
        title: String,
        artist: String,
    },
}

#[cfg(test)]
mod tests {
    use super::LibraryListing;
    use std::path::PathBuf;

    #[test]
    fn test_directory_names_prepend_parent_sentinel() {
        let listing = LibraryListing {
            directory: PathBuf::from("/music"),
            directories: vec![PathBuf::from("/music/Albums"), PathBuf::from("/music/Live")],
            files: vec![PathBuf::from("/music/intro.mp3")],
        };

        assert_eq!(listing.directory_names(), vec!["...", "Albums", "Live"]);
        assert_eq!(listing.file_names(), vec!["intro.mp3"]);
    }

    #[test]
    fn test_empty_listing_still_offers_parent_sentinel() {
        let listing = LibraryListing::default();
        assert_eq!(listing.directory_names(), vec!["..."]);
        assert!(listing.file_names().is_empty());
    }
}
