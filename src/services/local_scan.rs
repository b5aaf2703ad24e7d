//! Discovers upload candidates laid out as `root/{source_id}/{name}`.

use crate::models::local_file::LocalFileEntry;
use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, warn};

/// Immediate subdirectories of `root`, sorted by name.
pub async fn source_dirs(root: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut sources = Vec::new();
    for (name, path) in sorted_entries(root).await? {
        if !is_dir(&path).await {
            debug!("skipping non-directory {}", path.display());
            continue;
        }
        match name.into_string() {
            Ok(source_id) => sources.push((source_id, path)),
            Err(raw) => warn!("skipping source with non UTF-8 name {:?}", raw),
        }
    }
    Ok(sources)
}

/// Regular files directly inside `dir`, sorted by name.
pub async fn source_files(source_id: &str, dir: &Path) -> io::Result<Vec<LocalFileEntry>> {
    let mut files = Vec::new();
    for (name, path) in sorted_entries(dir).await? {
        let meta = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                debug!("skipping non-file {}", path.display());
                continue;
            }
        };
        let Ok(name) = name.into_string() else {
            warn!("skipping file with non UTF-8 name in {}", dir.display());
            continue;
        };
        files.push(LocalFileEntry {
            source_id: source_id.to_string(),
            name,
            size: meta.len() as i64,
            path,
        });
    }
    Ok(files)
}

/// False for anything that cannot be stat'ed, such as a dangling link.
async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|meta| meta.is_dir()).unwrap_or(false)
}

async fn sorted_entries(dir: &Path) -> io::Result<Vec<(OsString, PathBuf)>> {
    let mut reader = fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        entries.push((entry.file_name(), entry.path()));
    }
    entries.sort();
    Ok(entries)
}
