use std::path::Path;

/// One playlist entry: a display title plus a local path or remote URI.
/// Entries have no stable id; identity is the position in the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub source: String,
}

impl Track {
    /// Builds a track for a local file, deriving the title from the file
    /// stem. Tag metadata may refine the title later.
    pub fn from_local_path(path: &Path) -> Track {
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Track {
            title,
            source: path.to_string_lossy().into_owned(),
        }
    }

    /// Builds a track for a remote URI. The URI doubles as the provisional
    /// title until stream metadata resolves.
    pub fn from_remote_uri(uri: &str) -> Track {
        Track {
            title: uri.to_string(),
            source: uri.to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }
}

/// Ordered queue of tracks. Insertion order is playback order; the playlist
/// never reorders itself. The playing cursor lives in the session manager.
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new() -> Playlist {
        Playlist { tracks: Vec::new() }
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn get_track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Replaces the whole queue, used for session restore.
    pub fn replace_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
    }

    /// Updates a display title in place; returns false on a bad index.
    pub fn set_track_title(&mut self, index: usize, title: &str) -> bool {
        match self.tracks.get_mut(index) {
            Some(track) => {
                track.title = title.to_string();
                true
            }
            None => false,
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.tracks.iter().map(|track| track.title.clone()).collect()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

#[cfg(test)]
mod tests {
    use super::{Playlist, Track};
    use std::path::Path;

    #[test]
    fn test_local_track_title_is_file_stem() {
        let track = Track::from_local_path(Path::new("/music/Album/03 - Hologram.flac"));
        assert_eq!(track.title, "03 - Hologram");
        assert!(!track.is_remote());
    }

    #[test]
    fn test_remote_track_detection_by_scheme() {
        assert!(Track::from_remote_uri("https://radio.example/stream.mp3").is_remote());
        assert!(Track::from_remote_uri("http://radio.example/stream.mp3").is_remote());
        assert!(!Track::from_local_path(Path::new("/music/http_notes.mp3")).is_remote());
    }

    #[test]
    fn test_append_preserves_order_and_duplicates() {
        let mut playlist = Playlist::new();
        playlist.add_track(Track::from_remote_uri("https://radio.example/a"));
        playlist.add_track(Track::from_local_path(Path::new("/music/a.mp3")));
        playlist.add_track(Track::from_local_path(Path::new("/music/a.mp3")));

        assert_eq!(playlist.num_tracks(), 3);
        assert_eq!(playlist.get_track(1), playlist.get_track(2));
        assert_eq!(playlist.titles(), vec!["https://radio.example/a", "a", "a"]);
    }

    #[test]
    fn test_get_track_out_of_range_is_none() {
        let mut playlist = Playlist::new();
        playlist.add_track(Track::from_local_path(Path::new("/music/a.mp3")));
        assert!(playlist.get_track(1).is_none());
    }

    #[test]
    fn test_clear_and_replace() {
        let mut playlist = Playlist::new();
        playlist.add_track(Track::from_local_path(Path::new("/music/a.mp3")));
        playlist.clear();
        assert!(playlist.is_empty());

        playlist.replace_tracks(vec![
            Track::from_local_path(Path::new("/music/b.mp3")),
            Track::from_local_path(Path::new("/music/c.mp3")),
        ]);
        assert_eq!(playlist.num_tracks(), 2);
        assert_eq!(playlist.get_track(0).map(|t| t.title.as_str()), Some("b"));
    }

    #[test]
    fn test_set_track_title_refines_display_title() {
        let mut playlist = Playlist::new();
        playlist.add_track(Track::from_local_path(Path::new("/music/03_hologram.mp3")));

        assert!(playlist.set_track_title(0, "Hologram"));
        assert_eq!(playlist.get_track(0).map(|t| t.title.as_str()), Some("Hologram"));
        // Source stays untouched; only the display title is refined.
        assert_eq!(
            playlist.get_track(0).map(|t| t.source.as_str()),
            Some("/music/03_hologram.mp3")
        );
        assert!(!playlist.set_track_title(5, "nope"));
    }
}
