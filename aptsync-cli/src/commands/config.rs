//! Config command - show the effective configuration.

use std::path::Path;

use aptsync::ConfigFile;

use super::common::load_config;
use crate::error::CliError;

/// Run the config command.
pub fn run(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(path)?;
    let source = path
        .map(Path::to_path_buf)
        .unwrap_or_else(ConfigFile::default_path);

    if source.exists() {
        println!("Configuration file: {}", source.display());
    } else {
        println!(
            "Configuration file: {} (not found, defaults shown)",
            source.display()
        );
    }
    println!();
    println!("[mirror]");
    println!("  root = {}", config.root.display());
    println!("  workers = {}", config.workers);

    for target in &config.targets {
        println!();
        println!("[dist \"{}\"]", target.dist);
        println!("  url = {}", target.url);
        println!("  components = {}", target.components.join(", "));
        println!("  architectures = {}", target.architectures.join(", "));
        println!("  languages = {}", target.languages.join(", "));
    }

    if config.targets.is_empty() {
        println!();
        println!("No distributions configured. Run 'aptsync init' to create a starter file.");
    }

    Ok(())
}
