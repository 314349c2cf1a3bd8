//! Mirror APT package repositories onto local disk.
//!
//! aptsync keeps a local tree (`dists/` indexes plus a `pool/` of package
//! archives) synchronized with one or more upstream distributions. Existing
//! files are kept when their SHA-256 still matches, downloads are committed
//! atomically, and archives that upstream no longer references are pruned at
//! the end of a complete run.
//!
//! # Architecture
//!
//! ```text
//! Release ──► parse + filter ──► fetch each index ──► by-hash alias
//!                                      │
//!                            (package lists only)
//!                                      ▼
//!             decode ──► verify (W workers) ──► download (W workers) ──► pool/
//!                │
//!                └──► ValidPathSet ──(after all distributions)──► OrphanReaper
//! ```
//!
//! # Example
//!
//! ```ignore
//! use aptsync::{DistributionTarget, MirrorConfig, MirrorOrchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = MirrorConfig::new("/srv/mirror")
//!     .with_workers(8)
//!     .with_target(
//!         DistributionTarget::new("https://deb.debian.org/debian", "bookworm")
//!             .with_component("main")
//!             .with_architecture("amd64")
//!             .with_language("en"),
//!     );
//!
//! let orchestrator = MirrorOrchestrator::new(config)?;
//! let summary = orchestrator.run(CancellationToken::new()).await?;
//! println!("committed {} packages", summary.committed);
//! ```

/// Crate version, as compiled.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod byhash;
pub mod config;
pub mod error;
pub mod index;
pub mod mirror;
pub mod pipeline;
pub mod reaper;
pub mod release;
pub mod telemetry;
pub mod transport;

pub use config::{ConfigFile, DistributionTarget, MirrorConfig, DEFAULT_WORKERS};
pub use error::{SyncError, SyncResult};
pub use mirror::{MirrorOrchestrator, MirrorSummary};
pub use pipeline::{ProgressSnapshot, ProgressTracker};
