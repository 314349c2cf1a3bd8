//! Package index decoding.
//!
//! A `Packages` index is a sequence of stanzas separated by blank lines,
//! one per package:
//!
//! ```text
//! Package: foo
//! Version: 1.0-1
//! Filename: pool/main/f/foo/foo_1.0-1_amd64.deb
//! Size: 13814
//! SHA256: 49c4f2e9d72cd3a9e4e9023ea4dedd66d2498b9ce687b4a23c54c2e0c9674fa6
//! Description: an example
//! ...
//!
//! Package: bar
//! ```
//!
//! Only `Filename:` and `SHA256:` are extracted; a stanza missing either is
//! skipped silently. Gzip indexes are decompressed transparently. Xz indexes
//! are refused with a format error so they fail loudly instead of being
//! skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{SyncError, SyncResult};

/// Buffer capacity for the index reader. Description and tag fields can run
/// to hundreds of KB on a single line, so the reader is sized to swallow
/// them without thrashing.
const READER_CAPACITY: usize = 5 * 1024 * 1024;

/// One package entry decoded from an index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageRecord {
    /// Path relative to the repository root, from the `Filename:` field.
    pub filename: String,
    /// Lowercase hex SHA-256 of the archive, from the `SHA256:` field.
    pub sha256: String,
}

impl PackageRecord {
    fn is_complete(&self) -> bool {
        !self.filename.is_empty() && !self.sha256.is_empty()
    }
}

/// Decode a local package index into its records, in stanza order.
///
/// Compression is chosen by file extension: `.gz` is decompressed
/// transparently (multi-member streams included), `.xz` returns
/// [`SyncError::UnsupportedCompression`], anything else is read as plain
/// text. Blocking; run on a blocking thread from async contexts.
pub fn decode_package_index(path: &Path) -> SyncResult<Vec<PackageRecord>> {
    let file = File::open(path).map_err(|e| SyncError::filesystem(path, e))?;

    let reader: Box<dyn Read> = match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => Box::new(MultiGzDecoder::new(file)),
        Some("xz") => {
            return Err(SyncError::UnsupportedCompression {
                path: path.to_path_buf(),
            })
        }
        _ => Box::new(file),
    };

    parse_stanzas(BufReader::with_capacity(READER_CAPACITY, reader), path)
}

fn parse_stanzas<R: BufRead>(mut reader: R, path: &Path) -> SyncResult<Vec<PackageRecord>> {
    let mut records = Vec::new();
    let mut current = PackageRecord::default();
    let mut in_stanza = false;
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).map_err(|e| SyncError::Format {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        if read == 0 {
            break;
        }

        let text = line.trim_end_matches('\n').trim_end_matches('\r');

        // A blank line ends the stanza; emit it only if both fields landed.
        if text.trim().is_empty() {
            if in_stanza && current.is_complete() {
                records.push(std::mem::take(&mut current));
            } else {
                current = PackageRecord::default();
            }
            in_stanza = false;
            continue;
        }

        in_stanza = true;

        // Exact prefixes, value taken verbatim. Repeats within a stanza
        // overwrite, so the last occurrence wins.
        if let Some(value) = text.strip_prefix("Filename: ") {
            current.filename = value.to_string();
        } else if let Some(value) = text.strip_prefix("SHA256: ") {
            current.sha256 = value.to_string();
        }
    }

    // Final stanza when the file does not end with a blank line.
    if in_stanza && current.is_complete() {
        records.push(current);
    }

    Ok(records)
}
