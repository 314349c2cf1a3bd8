//! Atomic fetch of a URL to a local file.
//!
//! The body is streamed into a sibling `.part` file while a SHA-256
//! accumulator consumes the same bytes, so the content is hashed in a
//! single pass. Only after the stream ends (and the digest matches the
//! expected hash, when one is supplied) is the partial renamed over the
//! destination. The rename is the commit point: the destination is always
//! either absent or a complete, previously verified file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{SyncError, SyncResult};
use crate::transport::Transport;

/// Suffix for the in-flight sibling file.
const PARTIAL_SUFFIX: &str = ".part";

/// Streams URLs to disk with single-pass hashing and rename commits.
///
/// One fetcher is shared by all download workers; it holds only the
/// transport handle.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch `url` into `dest`, returning the computed hex digest.
    ///
    /// Parent directories are created as needed. With `expected` set, a
    /// digest mismatch discards the partial file and returns
    /// [`SyncError::ChecksumMismatch`]; the destination is left untouched
    /// (absent, or stale from an earlier run). With `expected` unset the
    /// content is committed as-is, which is how trust-root metadata is
    /// mirrored byte-for-byte.
    pub async fn fetch(&self, url: &str, dest: &Path, expected: Option<&str>) -> SyncResult<String> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::filesystem(parent, e))?;
        }

        let response = self.transport.fetch(url).await?;
        if !response.is_success() {
            return Err(SyncError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        let partial = partial_path(dest);
        let mut file = fs::File::create(&partial)
            .await
            .map_err(|e| SyncError::filesystem(&partial, e))?;

        let mut hasher = Sha256::new();
        let mut body = response.body;

        let streamed: SyncResult<()> = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                hasher.update(&chunk);
                file.write_all(&chunk)
                    .await
                    .map_err(|e| SyncError::filesystem(&partial, e))?;
            }
            file.flush()
                .await
                .map_err(|e| SyncError::filesystem(&partial, e))
        }
        .await;

        // Close before removing or renaming.
        drop(file);

        if let Err(e) = streamed {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        let actual = format!("{:x}", hasher.finalize());

        if let Some(expected) = expected {
            if actual != expected {
                let _ = fs::remove_file(&partial).await;
                return Err(SyncError::ChecksumMismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        fs::rename(&partial, dest)
            .await
            .map_err(|e| SyncError::filesystem(dest, e))?;

        Ok(actual)
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
