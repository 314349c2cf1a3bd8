//! Shared configuration loading for CLI commands.

use std::path::Path;

use aptsync::{ConfigFile, MirrorConfig};

use crate::error::CliError;

/// Load the mirror configuration.
///
/// An explicit path must load cleanly. The default path may be absent, in
/// which case built-in defaults are returned; `sync` then refuses to run
/// with zero distributions rather than silently doing nothing.
pub fn load_config(path: Option<&Path>) -> Result<MirrorConfig, CliError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (ConfigFile::default_path(), false),
    };

    if !required && !path.exists() {
        return Ok(MirrorConfig::default());
    }

    ConfigFile::load(&path)
        .map_err(|e| CliError::Config(format!("Cannot read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(
            &path,
            "[mirror]\nroot = /srv/mirror\nworkers = 3\n\n\
             [dist \"bookworm\"]\nurl = http://mirror.test/debian\ncomponents = main\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.root, std::path::PathBuf::from("/srv/mirror"));
        assert_eq!(config.workers, 3);
        assert_eq!(config.targets.len(), 1);
    }

    #[test]
    fn test_explicit_missing_path_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.ini");

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("absent.ini"));
    }
}
