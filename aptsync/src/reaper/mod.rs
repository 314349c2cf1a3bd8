//! Removal of pool archives no longer referenced upstream.
//!
//! While distributions are mirrored, every package path seen in an index is
//! recorded in a [`ValidPathSet`]. After the last distribution, the reaper
//! walks the pool subtree and deletes any `.deb` whose root-relative path is
//! not in the set. Only archives are candidates; indexes, readmes, and any
//! other files under the pool are never touched.
//!
//! The reaper must only run after a complete, uncancelled pass: a partial
//! set would misclassify still-valid archives as orphans.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

/// Run-scoped accumulator of upstream-referenced package paths.
///
/// Paths are root-relative with forward slashes, exactly as they appear in
/// `Filename:` fields. Workers from several distributions insert
/// concurrently; the reaper reads once at the end of the run.
#[derive(Debug, Default)]
pub struct ValidPathSet {
    paths: Mutex<HashSet<String>>,
}

impl ValidPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>) {
        self.paths.lock().insert(path.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }
}

/// Deletes orphaned package archives from the pool.
pub struct OrphanReaper;

impl OrphanReaper {
    pub fn new() -> Self {
        Self
    }

    /// Walks `<root>/pool` and removes unreferenced `.deb` files.
    ///
    /// Returns the number of files actually removed. A missing pool
    /// directory is a no-op. Walk errors abort the reap before anything is
    /// deleted; individual removal failures are logged and skipped.
    pub fn reap(&self, root: &Path, valid: &ValidPathSet) -> SyncResult<usize> {
        let pool = root.join("pool");
        if !pool.is_dir() {
            return Ok(0);
        }

        info!("Scanning for orphaned packages");
        let orphans = collect_orphans(root, &pool, valid)?;

        if orphans.is_empty() {
            info!("No orphaned packages found");
            return Ok(0);
        }

        info!(count = orphans.len(), "Removing orphaned packages");
        let mut removed = 0;
        for path in orphans {
            debug!(path = %path.display(), "Removing orphan");
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove orphan"),
            }
        }

        Ok(removed)
    }
}

impl Default for OrphanReaper {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects every unreferenced archive under `pool`, depth-first.
fn collect_orphans(root: &Path, pool: &Path, valid: &ValidPathSet) -> SyncResult<Vec<PathBuf>> {
    let mut orphans = Vec::new();
    let mut stack = vec![pool.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| SyncError::filesystem(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| SyncError::filesystem(&dir, e))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|e| SyncError::filesystem(&path, e))?;

            if file_type.is_dir() {
                stack.push(path);
                continue;
            }

            let is_archive = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".deb"))
                .unwrap_or(false);
            if !is_archive {
                continue;
            }

            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if !valid.contains(&rel) {
                orphans.push(path);
            }
        }
    }

    Ok(orphans)
}
