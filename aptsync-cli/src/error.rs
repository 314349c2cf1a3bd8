//! Error type shared by CLI commands.

use aptsync::SyncError;
use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration loading, validation, or process setup failed.
    #[error("{0}")]
    Config(String),

    /// The mirror engine reported a fatal error.
    #[error(transparent)]
    Sync(#[from] SyncError),
}
