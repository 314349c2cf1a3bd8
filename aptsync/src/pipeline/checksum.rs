//! SHA-256 hashing of local files for the verification stage.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{SyncError, SyncResult};

/// Read buffer size for checksum calculation (64 KiB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the SHA-256 of a file, as lowercase hex.
///
/// Blocking; the verification stage runs it on blocking threads.
pub fn file_sha256(path: &Path) -> SyncResult<String> {
    let mut file = File::open(path).map_err(|e| SyncError::filesystem(path, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| SyncError::filesystem(path, e))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Whether a file's content hash equals `expected`.
///
/// A mismatch is a normal answer here, not an error; the verifier turns it
/// into a download candidate.
pub fn file_matches(path: &Path, expected: &str) -> SyncResult<bool> {
    Ok(file_sha256(path)? == expected)
}
