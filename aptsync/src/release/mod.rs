//! `Release` manifest parsing.
//!
//! A distribution's `Release` file lists every index it publishes, grouped
//! by checksum algorithm:
//!
//! ```text
//! Suite: stable
//! Codename: bookworm
//! SHA256:
//!  3957f28db16e3f28c7b34ae84f1c929c567de6970f3f1b95dac9b498dd80fe63   738242 contrib/binary-amd64/Packages
//!  3e9a121d599b56fcd29d0f134838c3fded71beeb7f67e3ac578be6b1f51d9d44   272387 contrib/binary-amd64/Packages.gz
//! ```
//!
//! Only the `SHA256:` block is consulted. Entry lines are indented; the
//! block ends at the first non-empty, non-indented line. Each entry is
//! `<hash> <size> <path>`; the path is kept when it carries a supported
//! compression extension and passes the [`IndexFilter`].

mod filter;

pub use filter::IndexFilter;

/// Extract the desired index paths from a `Release` manifest, in order of
/// appearance.
///
/// Uncompressed duplicates (`Packages` next to `Packages.gz`) are skipped
/// via the extension whitelist; `.xz` paths are admitted here and rejected
/// later by the decoder, so the failure is loud rather than silent.
pub fn parse_index_paths(manifest: &str, filter: &IndexFilter) -> Vec<String> {
    let mut desired = Vec::new();
    let mut in_sha256_block = false;

    for line in manifest.lines() {
        // The block opener is exactly "SHA256:"; entry lines are indented.
        if line == "SHA256:" {
            in_sha256_block = true;
            continue;
        }
        if in_sha256_block && !line.is_empty() && !line.starts_with(' ') {
            in_sha256_block = false;
        }
        if !in_sha256_block {
            continue;
        }

        // Entry format: checksum size path.
        let mut fields = line.split_whitespace();
        let path = match (fields.next(), fields.next(), fields.next()) {
            (Some(_checksum), Some(_size), Some(path)) => path,
            _ => continue,
        };

        let supported_ext =
            path.ends_with(".gz") || path.ends_with(".xz") || path.ends_with(".bz2");
        if !supported_ext {
            continue;
        }

        if filter.is_desired(path) {
            desired.push(path.to_string());
        }
    }

    desired
}
