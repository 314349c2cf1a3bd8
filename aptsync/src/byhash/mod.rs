//! Hash-addressed aliases for fetched index files.
//!
//! Acquire-by-hash clients resolve an index as
//! `<dir>/by-hash/SHA256/<hexdigest>` instead of by name. Every index this
//! engine fetches gets such an alias, published as a hard link beside the
//! named file (with a byte copy as fallback when linking fails, e.g. across
//! filesystems).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{SyncError, SyncResult};

/// Publishes `by-hash` aliases next to index files.
pub struct ContentAddressedAliaser {
    algorithm: &'static str,
}

impl ContentAddressedAliaser {
    pub fn new() -> Self {
        Self {
            algorithm: "SHA256",
        }
    }

    /// Publishes an alias of `source` named by `hash`, returning the alias
    /// path.
    ///
    /// The alias directory is `<parent of source>/by-hash/<ALGO>/`. An
    /// existing alias entry is removed first, so republishing after the
    /// source changed always reflects the current content instead of a stale
    /// link target.
    pub async fn publish(&self, source: &Path, hash: &str) -> SyncResult<PathBuf> {
        self.publish_with(source, hash, |src, dst| fs::hard_link(src, dst))
            .await
    }

    /// Publish with an explicit link primitive; any link failure falls back
    /// to a byte copy.
    async fn publish_with<L, Fut>(
        &self,
        source: &Path,
        hash: &str,
        link: L,
    ) -> SyncResult<PathBuf>
    where
        L: FnOnce(PathBuf, PathBuf) -> Fut,
        Fut: std::future::Future<Output = std::io::Result<()>>,
    {
        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        let alias_dir = dir.join("by-hash").join(self.algorithm);
        fs::create_dir_all(&alias_dir)
            .await
            .map_err(|e| SyncError::filesystem(&alias_dir, e))?;

        let alias = alias_dir.join(hash);
        match fs::remove_file(&alias).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(SyncError::filesystem(&alias, e)),
        }

        if link(source.to_path_buf(), alias.clone()).await.is_err() {
            fs::copy(source, &alias)
                .await
                .map_err(|e| SyncError::filesystem(&alias, e))?;
        }

        Ok(alias)
    }
}

impl Default for ContentAddressedAliaser {
    fn default() -> Self {
        Self::new()
    }
}
