//! Tracing subscriber installation.
//!
//! The library itself only emits through the `tracing` macros; installing a
//! subscriber is the binary's job, so tests and embedders stay in control of
//! output. [`init`] writes human-readable lines to stderr; [`init_with_file`]
//! additionally appends to a daily-rolling log file through a non-blocking
//! writer.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{SyncError, SyncResult};

/// Filter directives used when `RUST_LOG` is not set.
const DEFAULT_DIRECTIVES: &str = "aptsync=info,aptsync_cli=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

fn console_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::rfc_3339())
}

/// Installs the console subscriber.
///
/// A second call is a no-op, so commands can call this unconditionally.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(console_layer())
        .try_init();
}

/// Installs the console subscriber plus a daily-rolling file log.
///
/// Returns the writer guard; buffered lines are flushed when it drops, so
/// hold it for the life of the process.
pub fn init_with_file(log_dir: &Path) -> SyncResult<WorkerGuard> {
    std::fs::create_dir_all(log_dir).map_err(|e| SyncError::filesystem(log_dir, e))?;

    let appender = tracing_appender::rolling::daily(log_dir, "aptsync.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(console_layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .with_timer(LocalTime::rfc_3339()),
        )
        .try_init();

    Ok(guard)
}
