//! Configuration for the mirror engine.

use std::path::{Path, PathBuf};

mod file;

pub use file::ConfigFile;

/// Default number of workers per pipeline stage.
pub const DEFAULT_WORKERS: usize = 5;

/// One upstream distribution to mirror, with its index filters.
///
/// The filter lists select which indexes are fetched from the `Release`
/// manifest: components by path prefix, architectures via `binary-<arch>/`
/// and `cnf/Commands-<arch>`, languages via `i18n/Translation-<lang>`.
/// Empty lists select nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionTarget {
    /// Repository root URL, without a trailing slash (e.g.
    /// `https://deb.debian.org/debian`).
    pub url: String,

    /// Distribution codename under `dists/` (e.g. `bookworm`).
    pub dist: String,

    /// Components to mirror (e.g. `main`, `contrib`).
    pub components: Vec<String>,

    /// Binary architectures to mirror (e.g. `amd64`).
    pub architectures: Vec<String>,

    /// Translation languages to mirror. Matched by substring, so `en`
    /// also selects `en_GB`.
    pub languages: Vec<String>,
}

impl DistributionTarget {
    /// Create a target with empty filter lists.
    pub fn new(url: impl Into<String>, dist: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            dist: dist.into(),
            components: Vec::new(),
            architectures: Vec::new(),
            languages: Vec::new(),
        }
    }

    /// Add a component to mirror.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.components.push(component.into());
        self
    }

    /// Add a binary architecture to mirror.
    pub fn with_architecture(mut self, arch: impl Into<String>) -> Self {
        self.architectures.push(arch.into());
        self
    }

    /// Add a translation language to mirror.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.languages.push(language.into());
        self
    }
}

/// Configuration for a full mirror run.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Local storage root. Indexes land under `<root>/dists`, packages
    /// under `<root>/pool`.
    pub root: PathBuf,

    /// Workers per pipeline stage (verification and download each get
    /// this many).
    pub workers: usize,

    /// Distributions to mirror, processed in order.
    pub targets: Vec<DistributionTarget>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            workers: DEFAULT_WORKERS,
            targets: Vec::new(),
        }
    }
}

impl MirrorConfig {
    /// Create a configuration with the given storage root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Set the per-stage worker count. Zero falls back to the default.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 {
            DEFAULT_WORKERS
        } else {
            workers
        };
        self
    }

    /// Add a distribution to mirror.
    pub fn with_target(mut self, target: DistributionTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Directory holding manifests and indexes for one distribution.
    pub fn dist_dir(&self, dist: &str) -> PathBuf {
        self.root.join("dists").join(dist)
    }

    /// The package pool subtree.
    pub fn pool_dir(&self) -> PathBuf {
        self.root.join("pool")
    }

    /// Storage root as a path.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
