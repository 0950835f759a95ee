//! Directory scanning for the media browser.

use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::protocol::LibraryListing;

/// Audio file extensions eligible for playlist import.
pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 7] =
    ["mp3", "flac", "m4a", "ogg", "wav", "aac", "opus"];

/// Scan failures the session manager distinguishes for the user. Everything
/// that is not a permission or missing-directory problem collapses into `Io`.
#[derive(Debug)]
pub enum ScanError {
    AccessDenied,
    DirectoryNotFound,
    Io(String),
}

pub fn is_supported_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            SUPPORTED_AUDIO_EXTENSIONS
                .iter()
                .any(|supported| extension.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Scans one directory into an ordered listing. The listing is recomputed
/// from scratch on every call; unreadable entries inside a readable
/// directory are skipped rather than failing the scan.
pub fn scan_directory(directory: &Path) -> Result<LibraryListing, ScanError> {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(error) => return Err(classify_scan_error(directory, error)),
    };

    let mut directories = Vec::new();
    let mut files = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                debug!(
                    "Skipping unreadable entry in {}: {}",
                    directory.display(),
                    error
                );
                continue;
            }
        };

        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(error) => {
                debug!("Skipping entry of unknown type {}: {}", path.display(), error);
                continue;
            }
        };

        if file_type.is_dir() {
            directories.push(path);
        } else if is_supported_audio_file(&path) {
            files.push(path);
        }
    }

    directories.sort_unstable();
    files.sort_unstable();

    Ok(LibraryListing {
        directory: directory.to_path_buf(),
        directories,
        files,
    })
}

fn classify_scan_error(directory: &Path, error: io::Error) -> ScanError {
    match error.kind() {
        io::ErrorKind::PermissionDenied => ScanError::AccessDenied,
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => ScanError::DirectoryNotFound,
        _ => ScanError::Io(format!("{}: {}", directory.display(), error)),
    }
}

/// Resolves the synthesized parent entry of a listing. Returns `None` at a
/// filesystem root, where resolving the sentinel is a no-op.
pub fn parent_target(directory: &Path) -> Option<PathBuf> {
    directory
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
}
