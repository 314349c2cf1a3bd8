//! Index path filtering.
//!
//! Decides which index paths discovered in a `Release` manifest are wanted,
//! based on the configured components, architectures and languages. Paths
//! are relative to `dists/<dist>/`, e.g. `main/binary-amd64/Packages.gz`.

use crate::config::DistributionTarget;

/// Pure predicate over manifest index paths.
///
/// A path is desired when its component prefix matches AND it is one of:
/// a binary package list for a configured architecture, a translation file
/// for a configured language, or a command-not-found index for a configured
/// architecture. Empty filter lists match nothing.
#[derive(Debug, Clone)]
pub struct IndexFilter {
    components: Vec<String>,
    architectures: Vec<String>,
    languages: Vec<String>,
}

impl IndexFilter {
    pub fn new(
        components: Vec<String>,
        architectures: Vec<String>,
        languages: Vec<String>,
    ) -> Self {
        Self {
            components,
            architectures,
            languages,
        }
    }

    /// Build the filter for one distribution target.
    pub fn for_target(target: &DistributionTarget) -> Self {
        Self::new(
            target.components.clone(),
            target.architectures.clone(),
            target.languages.clone(),
        )
    }

    /// Whether this index path should be mirrored.
    pub fn is_desired(&self, path: &str) -> bool {
        let component_matches = self
            .components
            .iter()
            .any(|c| path.starts_with(&format!("{}/", c)));
        if !component_matches {
            return false;
        }

        let is_binary = self.architectures.iter().any(|arch| {
            path.contains(&format!("binary-{}/", arch)) && path.contains("Packages")
        });

        // Substring match on purpose: `en` also selects `en_GB`.
        let is_translation = path.contains("i18n/Translation-")
            && self
                .languages
                .iter()
                .any(|lang| path.contains(&format!("Translation-{}", lang)));

        let is_commands = path.contains("cnf/Commands-")
            && self
                .architectures
                .iter()
                .any(|arch| path.contains(&format!("Commands-{}", arch)));

        is_binary || is_translation || is_commands
    }
}
