//! A file discovered beneath the data directory.

use std::path::PathBuf;

/// Candidate for upload, found at `root/{source_id}/{name}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFileEntry {
    /// Name of the source directory (usually a device identifier).
    pub source_id: String,

    /// File name inside the source directory.
    pub name: String,

    /// Size in bytes at scan time.
    pub size: i64,

    /// Location on disk.
    pub path: PathBuf,
}
