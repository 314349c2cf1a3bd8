//! INI-backed persistence for [`MirrorConfig`].
//!
//! Layout: a `[mirror]` section for the storage root and worker count, and
//! one `[dist "<codename>"]` section per distribution target:
//!
//! ```ini
//! [mirror]
//! root = /var/spool/aptsync
//! workers = 5
//!
//! [dist "bookworm"]
//! url = https://deb.debian.org/debian
//! components = main, contrib
//! architectures = amd64
//! languages = en
//! ```

use std::path::{Path, PathBuf};

use ini::Ini;
use tracing::warn;

use crate::config::{DistributionTarget, MirrorConfig, DEFAULT_WORKERS};
use crate::error::{SyncError, SyncResult};

/// Loads and saves the mirror configuration file.
pub struct ConfigFile;

impl ConfigFile {
    /// Default configuration file location
    /// (`<config dir>/aptsync/config.ini`, platform dependent).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("aptsync").join("config.ini"))
            .unwrap_or_else(|| PathBuf::from("aptsync.ini"))
    }

    /// Load a configuration from the given path.
    pub fn load(path: &Path) -> SyncResult<MirrorConfig> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => SyncError::filesystem(path, source),
            ini::Error::Parse(parse) => SyncError::Format {
                path: path.to_path_buf(),
                detail: parse.to_string(),
            },
        })?;

        let mut config = MirrorConfig::default();

        if let Some(mirror) = ini.section(Some("mirror")) {
            if let Some(root) = mirror.get("root") {
                config.root = PathBuf::from(root);
            }
            if let Some(workers) = mirror.get("workers") {
                match workers.trim().parse::<usize>() {
                    Ok(n) if n > 0 => config.workers = n,
                    _ => {
                        warn!(value = workers, "ignoring invalid workers setting");
                        config.workers = DEFAULT_WORKERS;
                    }
                }
            }
        }

        for (section, properties) in ini.iter() {
            let Some(dist) = section.and_then(parse_dist_section) else {
                continue;
            };
            let url = properties.get("url").unwrap_or_default();
            let mut target = DistributionTarget::new(url, dist);
            target.components = split_list(properties.get("components"));
            target.architectures = split_list(properties.get("architectures"));
            target.languages = split_list(properties.get("languages"));
            config.targets.push(target);
        }

        Ok(config)
    }

    /// Save a configuration to the given path, creating parent directories
    /// as needed.
    pub fn save(config: &MirrorConfig, path: &Path) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::filesystem(parent, e))?;
        }

        let mut ini = Ini::new();
        ini.with_section(Some("mirror"))
            .set("root", config.root.display().to_string())
            .set("workers", config.workers.to_string());

        for target in &config.targets {
            ini.with_section(Some(format!("dist \"{}\"", target.dist)))
                .set("url", target.url.clone())
                .set("components", target.components.join(", "))
                .set("architectures", target.architectures.join(", "))
                .set("languages", target.languages.join(", "));
        }

        ini.write_to_file(path)
            .map_err(|e| SyncError::filesystem(path, e))
    }

    /// A starter configuration for `init`: one Debian stable target.
    pub fn starter() -> MirrorConfig {
        MirrorConfig::new("/var/spool/aptsync").with_target(
            DistributionTarget::new("https://deb.debian.org/debian", "bookworm")
                .with_component("main")
                .with_architecture("amd64")
                .with_language("en"),
        )
    }
}

/// Extract the codename from a `dist "<codename>"` section name.
fn parse_dist_section(section: &str) -> Option<&str> {
    let rest = section.strip_prefix("dist ")?;
    rest.strip_prefix('"')?.strip_suffix('"')
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");

        let config = MirrorConfig::new("/srv/mirror").with_workers(3).with_target(
            DistributionTarget::new("https://deb.debian.org/debian", "bookworm")
                .with_component("main")
                .with_component("contrib")
                .with_architecture("amd64")
                .with_language("en"),
        );

        ConfigFile::save(&config, &path).unwrap();
        let loaded = ConfigFile::load(&path).unwrap();

        assert_eq!(loaded.root, PathBuf::from("/srv/mirror"));
        assert_eq!(loaded.workers, 3);
        assert_eq!(loaded.targets, config.targets);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = ConfigFile::load(&dir.path().join("absent.ini"));
        assert!(matches!(result, Err(SyncError::Filesystem { .. })));
    }

    #[test]
    fn test_list_values_tolerate_spacing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(
            &path,
            "[mirror]\nroot = /m\n\n[dist \"trixie\"]\nurl = http://mirror.test/debian\ncomponents = main ,contrib,  non-free\narchitectures = amd64\n",
        )
        .unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.targets.len(), 1);
        assert_eq!(
            config.targets[0].components,
            vec!["main", "contrib", "non-free"]
        );
        assert!(config.targets[0].languages.is_empty());
    }

    #[test]
    fn test_invalid_workers_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[mirror]\nroot = /m\nworkers = many\n").unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_unrelated_sections_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[mirror]\nroot = /m\n\n[proxy]\nurl = none\n").unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_starter_has_one_target() {
        let starter = ConfigFile::starter();
        assert_eq!(starter.targets.len(), 1);
        assert_eq!(starter.targets[0].dist, "bookworm");
        assert_eq!(starter.workers, DEFAULT_WORKERS);
    }
}
