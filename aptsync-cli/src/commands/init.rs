//! Init command - write a starter configuration file.

use aptsync::ConfigFile;

use crate::error::CliError;

/// Run the init command.
pub fn run(force: bool) -> Result<(), CliError> {
    let path = ConfigFile::default_path();

    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Pass --force to overwrite it.",
            path.display()
        )));
    }

    ConfigFile::save(&ConfigFile::starter(), &path)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to add distributions, then run 'aptsync sync'.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
