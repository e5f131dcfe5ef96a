//! Reqforge filesystem infrastructure adapter.
//!
//! Implements the [`pipeline::FileReader`] port over the local filesystem.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The [`pipeline`] crate sees only the port. The
//! degrade-don't-crash contract lives here: a missing or unreadable file is
//! logged and yields an empty result, so one bad input never takes down a
//! whole pipeline run — stages decide for themselves whether an empty read is
//! fatal to their step.

use std::fs;
use std::path::Path;

use tracing::warn;

use pipeline::FileReader;

/// Local-filesystem [`FileReader`].
///
/// Non-UTF-8 content is read lossily: endpoint documentation occasionally
/// carries stray legacy-encoded bytes, and a replacement character beats
/// losing the file.
#[derive(Debug, Default, Clone)]
pub struct FsFileReader;

impl FsFileReader {
    pub fn new() -> Self {
        Self
    }
}

impl FileReader for FsFileReader {
    fn read_file(&self, path: &Path) -> String {
        match fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read file");
                String::new()
            }
        }
    }

    fn list_directory(&self, path: &Path) -> Vec<String> {
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to list directory");
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
