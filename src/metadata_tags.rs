//! Tag readers backed by `lofty`.
//!
//! Readers return empty strings (or a zero duration) when a value is absent;
//! callers keep their filename- or URI-derived fallbacks in that case.

use std::io::Cursor;
use std::path::Path;

use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::probe::Probe;
use lofty::read_from_path;
use lofty::tag::Tag;

/// Display metadata for one track. Empty fields mean the tag was absent.
#[derive(Debug, Clone, Default)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
}

fn first_non_empty_value<F>(primary_tag: Option<&Tag>, tags: &[Tag], mut extractor: F) -> String
where
    F: FnMut(&Tag) -> Option<String>,
{
    if let Some(tag) = primary_tag {
        if let Some(value) = extractor(tag) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    for tag in tags {
        if let Some(value) = extractor(tag) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    String::new()
}

fn tags_from_file(tagged_file: &TaggedFile) -> TrackTags {
    let primary_tag = tagged_file.primary_tag();
    let tags = tagged_file.tags();

    TrackTags {
        title: first_non_empty_value(primary_tag, tags, |tag| {
            tag.title().map(|value| value.into_owned())
        }),
        artist: first_non_empty_value(primary_tag, tags, |tag| {
            tag.artist().map(|value| value.into_owned())
        }),
    }
}

/// Reads title/artist tags from a local media file.
pub fn read_track_tags(path: &Path) -> TrackTags {
    match read_from_path(path) {
        Ok(tagged_file) => tags_from_file(&tagged_file),
        Err(_) => TrackTags::default(),
    }
}

/// Reads title/artist tags from in-memory media bytes (fetched remote media).
pub fn probe_track_tags(bytes: &[u8]) -> TrackTags {
    match probe_bytes(bytes) {
        Some(tagged_file) => tags_from_file(&tagged_file),
        None => TrackTags::default(),
    }
}

/// Track duration in milliseconds from a local file's properties, 0 when
/// the file cannot be probed.
pub fn read_duration_ms(path: &Path) -> u64 {
    read_from_path(path)
        .map(|tagged_file| tagged_file.properties().duration().as_millis() as u64)
        .unwrap_or(0)
}

/// Track duration in milliseconds from in-memory media bytes, 0 when the
/// bytes cannot be probed.
pub fn probe_duration_ms(bytes: &[u8]) -> u64 {
    probe_bytes(bytes)
        .map(|tagged_file| tagged_file.properties().duration().as_millis() as u64)
        .unwrap_or(0)
}

fn probe_bytes(bytes: &[u8]) -> Option<TaggedFile> {
    Probe::new(Cursor::new(bytes))
        .guess_file_type()
        .ok()?
        .read()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::{probe_track_tags, read_duration_ms, read_track_tags};
    use std::path::Path;

    #[test]
    fn test_unreadable_file_yields_empty_tags() {
        let tags = read_track_tags(Path::new("/nonexistent/track.mp3"));
        assert!(tags.title.is_empty());
        assert!(tags.artist.is_empty());
    }

    #[test]
    fn test_unparseable_bytes_yield_empty_tags() {
        let tags = probe_track_tags(b"definitely not audio");
        assert!(tags.title.is_empty());
        assert!(tags.artist.is_empty());
    }

    #[test]
    fn test_unreadable_file_yields_zero_duration() {
        assert_eq!(read_duration_ms(Path::new("/nonexistent/track.mp3")), 0);
    }
}
