//! Command-line interface to the aptsync mirror engine.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::sync::SyncArgs;

#[derive(Parser)]
#[command(
    name = "aptsync",
    version,
    about = "Mirror APT repositories onto local disk"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a mirror sync for every configured distribution
    Sync {
        /// Path to the configuration file
        #[arg(long, env = "APTSYNC_CONFIG")]
        config: Option<PathBuf>,

        /// Storage root override
        #[arg(long, env = "APTSYNC_ROOT")]
        root: Option<PathBuf>,

        /// Workers per pipeline stage
        #[arg(long, env = "APTSYNC_WORKERS")]
        workers: Option<usize>,

        /// Suppress the progress bar
        #[arg(long)]
        quiet: bool,

        /// Also append logs to a daily-rolling file in this directory
        #[arg(long, env = "APTSYNC_LOG_DIR")]
        log_dir: Option<PathBuf>,
    },

    /// Write a starter configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Config {
        /// Path to the configuration file
        #[arg(long, env = "APTSYNC_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sync {
            config,
            root,
            workers,
            quiet,
            log_dir,
        } => commands::sync::run(SyncArgs {
            config,
            root,
            workers,
            quiet,
            log_dir,
        }),
        Commands::Init { force } => commands::init::run(force),
        Commands::Config { config } => commands::config::run(config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
