//! Filesystem scans: newest source mtime and output directory listings.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directory names never treated as build inputs.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules", ".git"];

/// Newest modification time among files under `watch` (relative to `root`).
///
/// Missing watch paths are ignored. Returns `None` when no file was found.
pub fn newest_source_mtime(root: &Path, watch: &[PathBuf]) -> Result<Option<SystemTime>> {
    let mut newest: Option<SystemTime> = None;
    for rel in watch {
        let path = root.join(rel);
        if !path.exists() {
            debug!(path = %path.display(), "watched path missing, ignoring");
            continue;
        }
        for entry in WalkDir::new(&path).into_iter().filter_entry(|e| !is_skipped(e)) {
            let entry = entry.with_context(|| format!("walk {}", path.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let modified = entry
                .metadata()
                .with_context(|| format!("stat {}", entry.path().display()))?
                .modified()
                .with_context(|| format!("mtime {}", entry.path().display()))?;
            newest = Some(newest.map_or(modified, |current| current.max(modified)));
        }
    }
    Ok(newest)
}

/// Modification time of `path`, or `None` if it does not exist.
pub fn file_mtime(path: &Path) -> Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(
            metadata
                .modified()
                .with_context(|| format!("mtime {}", path.display()))?,
        )),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("stat {}", path.display())),
    }
}

/// Sorted list of the direct entries of `dir`.
pub fn list_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Modification time of the newest `.wasm` module directly in `dir`.
///
/// Returns `None` when `dir` is missing or holds no module.
pub fn newest_wasm_mtime(dir: &Path) -> Result<Option<SystemTime>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut newest: Option<SystemTime> = None;
    for path in list_artifacts(dir)? {
        if !path.extension().is_some_and(|ext| ext == "wasm") {
            continue;
        }
        if let Some(modified) = file_mtime(&path)? {
            newest = Some(newest.map_or(modified, |current| current.max(modified)));
        }
    }
    Ok(newest)
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}
