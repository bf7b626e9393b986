//! Filesystem helper functions for other modules.
//!
//! These are thin wrappers around [`std::fs`] that treat an unreadable directory or file the same as a missing one,
//! which is what the scanners want: a snapshot with a broken boot directory is skipped, not fatal.

use std::{fs, io, path::Path};

use log::{debug, warn};

/// Checks if a path exists and is a regular file, following symlinks.
#[must_use = "Has no effect if the result is unused"]
pub fn is_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|metadata| metadata.is_file())
}

/// Checks if a path exists and is a directory, following symlinks.
#[must_use = "Has no effect if the result is unused"]
pub fn is_dir(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|metadata| metadata.is_dir())
}

/// Returns the names of every regular file in a directory, sorted by name.
///
/// Names that are not valid UTF-8 are skipped, as they could not be written into a GRUB script anyways.
#[must_use = "Has no effect if the result is unused"]
pub fn sorted_file_names(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Could not read {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_file(&dir.join(name)))
        .collect();
    names.sort_unstable();
    names
}

/// Reads a file into a [`String`] if it exists.
///
/// A missing file returns [`None`] silently, any other error is logged and also returns [`None`].
#[must_use = "Has no effect if the result is unused"]
pub fn read_optional(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!("Could not read {}: {e}", path.display());
            None
        }
    }
}

/// Removes a file, ignoring the error if it does not exist.
///
/// # Errors
///
/// May return an `Error` if the file exists but could not be removed.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
