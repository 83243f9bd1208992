//! File system operations for collection directories
//!
//! Every file the store owns is replaced wholesale: write to a sibling temp
//! file, then rename over the target. Readers therefore see either the old or
//! the new content, never a partial write.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use walkdir::WalkDir;

use crate::error::{CorruptionError, IoContext, StoreError, StoreResult};

/// Prefix of point files inside shard directories
pub const POINT_FILE_PREFIX: &str = "vector_";

/// Extension of point files
pub const POINT_FILE_EXTENSION: &str = "json";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hidden, process-unique name for a temporary sibling of `label`.
pub fn temp_name(label: &str) -> String {
    let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(".{label}.{}.{unique}.tmp", std::process::id())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(temp_name(&file_name))
}

fn write_and_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    file.write_all(bytes)?;
    file.flush()?;
    fs::rename(temp_path, path)
}

/// Atomically replace `path` with `bytes`, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    let temp_path = temp_path_for(path);
    let mut result = write_and_rename(&temp_path, path, bytes);

    // A concurrent prune may remove the shard directory between creating it
    // and opening the temp file
    let parent_vanished = matches!(&result, Err(e) if e.kind() == io::ErrorKind::NotFound);
    if let (true, Some(parent)) = (parent_vanished, path.parent()) {
        fs::create_dir_all(parent).with_path(parent)?;
        result = write_and_rename(&temp_path, path, bytes);
    }

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

/// Read a file that must exist; absence is reported as corruption.
pub fn read_required(path: &Path) -> StoreResult<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CorruptionError::missing(path).into()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Remove a file, treating "already gone" as success.
///
/// Returns whether a file was actually removed.
pub fn remove_file_if_exists(path: &Path) -> StoreResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Remove empty directories from `start` upwards, stopping at `root`.
pub fn prune_empty_dirs(start: &Path, root: &Path) {
    let mut current = start.to_path_buf();
    while current != root && current.starts_with(root) {
        // Fails when not empty, which ends the walk
        if fs::remove_dir(&current).is_err() {
            break;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }
}

/// True if `path` names a point file.
pub fn is_point_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == POINT_FILE_EXTENSION)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(POINT_FILE_PREFIX))
}

/// Collect every point file under `dir`, recursively.
///
/// Unreadable directory entries are skipped with a warning; the caller gets
/// whatever could be listed.
pub fn collect_point_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {e}", dir.display());
                continue;
            }
        };
        if entry.file_type().is_file() && is_point_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files
}

/// Point files directly inside `dir` (no recursion).
pub fn point_files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_point_file(path))
        .collect()
}
