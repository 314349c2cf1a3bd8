//! Sync command - run a full mirror pass.

use std::path::PathBuf;
use std::time::Duration;

use aptsync::{MirrorConfig, MirrorOrchestrator, MirrorSummary, ProgressSnapshot};
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::common::load_config;
use crate::error::CliError;

/// Arguments for the sync command.
pub struct SyncArgs {
    pub config: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub workers: Option<usize>,
    pub quiet: bool,
    pub log_dir: Option<PathBuf>,
}

/// Run the sync command.
pub fn run(args: SyncArgs) -> Result<(), CliError> {
    // The appender guard must outlive the run or buffered log lines are lost.
    let _guard = match &args.log_dir {
        Some(dir) => Some(aptsync::telemetry::init_with_file(dir)?),
        None => {
            aptsync::telemetry::init();
            None
        }
    };

    let mut config = load_config(args.config.as_deref())?;
    if let Some(root) = args.root {
        config.root = root;
    }
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }

    // An empty target list would make every pool archive an orphan and the
    // cleanup pass would delete the whole mirror.
    if config.targets.is_empty() {
        return Err(CliError::Config(
            "No distributions configured. Run 'aptsync init' and edit the \
             generated file, or pass --config."
                .to_string(),
        ));
    }

    println!("aptsync v{}", aptsync::VERSION);
    println!();
    println!("Root:          {}", config.root.display());
    println!("Workers:       {}", config.workers);
    println!("Distributions: {}", config.targets.len());
    println!();
    println!("Press Ctrl+C to stop; in-flight downloads finish first");
    println!();

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received interrupt, cancelling sync...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let runtime = Runtime::new()
        .map_err(|e| CliError::Config(format!("Failed to start async runtime: {}", e)))?;

    let bar = progress_bar(args.quiet);
    let summary = runtime.block_on(run_mirror(config, cancel, &bar))?;
    bar.finish_and_clear();

    if summary.failed > 0 {
        warn!(failed = summary.failed, "Some packages could not be synced");
    }

    print_summary(&summary);
    Ok(())
}

/// Drive the orchestrator while mirroring progress into the bar.
async fn run_mirror(
    config: MirrorConfig,
    cancel: CancellationToken,
    bar: &ProgressBar,
) -> Result<MirrorSummary, CliError> {
    let orchestrator = MirrorOrchestrator::new(config)?;
    let mut progress = orchestrator.subscribe();

    // The watch channel closes when the run finishes, ending the render
    // loop, so both sides of the join complete together.
    let (summary, ()) = tokio::join!(orchestrator.run(cancel), async {
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow_and_update().clone();
            render(bar, &snapshot);
        }
    });

    Ok(summary?)
}

/// A download counter on stdout, or a hidden bar under --quiet.
///
/// Logs go to stderr, so the bar gets stdout to itself.
fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stdout());
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn render(bar: &ProgressBar, snapshot: &ProgressSnapshot) {
    bar.set_length(snapshot.total as u64);
    bar.set_position(snapshot.downloaded as u64);
    if !snapshot.current_file.is_empty() {
        bar.set_message(snapshot.current_file.clone());
    }
}

/// Print the final tallies.
fn print_summary(summary: &MirrorSummary) {
    println!();
    println!("{}", style("Sync Summary").bold());
    println!("────────────");
    println!("  Distributions:   {}", summary.distributions);
    println!("  Packages seen:   {}", summary.records_seen);
    println!("  Downloaded:      {}", summary.committed);
    println!("  Already current: {}", summary.kept);
    if summary.failed > 0 {
        println!("  Failed:          {}", style(summary.failed).red());
    } else {
        println!("  Failed:          0");
    }
    println!("  Orphans removed: {}", summary.orphans_removed);

    if summary.cancelled {
        println!();
        println!(
            "{}",
            style("Run cancelled before completion; pool cleanup was skipped.").yellow()
        );
    }
}
