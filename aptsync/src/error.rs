//! Error types for the mirror engine.
//!
//! One enum covers the whole engine so that pipeline workers, the aliaser and
//! the orchestrator can all speak the same taxonomy: transport, integrity,
//! format, filesystem and cancellation. Callers decide severity; most errors
//! are local to one record or one index and never abort a run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while mirroring a repository.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network-level failure reaching the upstream repository.
    #[error("transport error fetching {url}: {reason}")]
    Transport { url: String, reason: String },

    /// Upstream answered with a non-success status code.
    #[error("unexpected status {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// Streamed content did not match the checksum declared upstream.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The index is compressed with a format this engine does not decode.
    #[error("xz decompression is not implemented: {}", path.display())]
    UnsupportedCompression { path: PathBuf },

    /// The index bytes could not be decoded.
    #[error("malformed index {}: {detail}", path.display())]
    Format { path: PathBuf, detail: String },

    /// A local filesystem operation failed.
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The run was cancelled cooperatively. Not a failure.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Result type for mirror operations.
pub type SyncResult<T> = Result<T, SyncError>;
