//! Orchestration of a full mirror run.
//!
//! The [`MirrorOrchestrator`] sequences every stage for each configured
//! distribution:
//!
//! ```text
//! for each distribution:
//!     fetch trust roots (InRelease, Release, Release.gpg), byte for byte
//!     read the local Release back and discover matching index paths
//!     for each index:
//!         fetch it, publish its by-hash alias
//!         if it is a package list: decode records, register them as
//!         valid, run the verify/download pipeline
//! after all distributions (unless cancelled):
//!     reap pool archives missing from the valid set
//! ```
//!
//! Failures are contained at the smallest useful scope: a bad record fails
//! that record, a bad index skips that index, an unreadable Release skips
//! that distribution. Only a storage root that cannot be created fails the
//! run itself.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::byhash::ContentAddressedAliaser;
use crate::config::{DistributionTarget, MirrorConfig};
use crate::error::{SyncError, SyncResult};
use crate::index::decode_package_index;
use crate::pipeline::{Fetcher, PackagePipeline, ProgressSnapshot, ProgressTracker};
use crate::reaper::{OrphanReaper, ValidPathSet};
use crate::release::{parse_index_paths, IndexFilter};
use crate::transport::{ReqwestTransport, Transport};

/// Signature-bearing files mirrored without a known checksum.
const TRUST_ROOT_FILES: [&str; 3] = ["InRelease", "Release", "Release.gpg"];

/// Tallies for one complete mirror run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MirrorSummary {
    /// Distributions attempted, including ones that failed wholesale.
    pub distributions: usize,
    /// Package records decoded across all indexes.
    pub records_seen: usize,
    /// Records whose local file already matched.
    pub kept: usize,
    /// Records downloaded and committed.
    pub committed: usize,
    /// Records that could not be fetched or verified.
    pub failed: usize,
    /// Pool archives deleted by the reaper.
    pub orphans_removed: usize,
    /// Whether the run ended early on cancellation.
    pub cancelled: bool,
}

/// Drives a whole mirror run against one storage root.
pub struct MirrorOrchestrator {
    config: MirrorConfig,
    fetcher: Fetcher,
    pipeline: PackagePipeline,
    aliaser: ContentAddressedAliaser,
    valid_paths: Arc<ValidPathSet>,
    progress: Arc<ProgressTracker>,
}

impl MirrorOrchestrator {
    /// Creates an orchestrator using the HTTP transport.
    pub fn new(config: MirrorConfig) -> SyncResult<Self> {
        Ok(Self::with_transport(config, Arc::new(ReqwestTransport::new()?)))
    }

    /// Creates an orchestrator over a caller-supplied transport.
    pub fn with_transport(config: MirrorConfig, transport: Arc<dyn Transport>) -> Self {
        let progress = Arc::new(ProgressTracker::new());
        let fetcher = Fetcher::new(transport);
        let pipeline =
            PackagePipeline::new(fetcher.clone(), config.workers, Arc::clone(&progress));

        Self {
            config,
            fetcher,
            pipeline,
            aliaser: ContentAddressedAliaser::new(),
            valid_paths: Arc::new(ValidPathSet::new()),
            progress,
        }
    }

    /// Subscribes to progress snapshots.
    ///
    /// The channel keeps only the latest snapshot and closes when the run
    /// finishes. Subscribe before calling [`run`](Self::run), which consumes
    /// the orchestrator.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    /// Executes the run to completion or cancellation.
    ///
    /// Per-distribution and per-record failures are tallied in the returned
    /// [`MirrorSummary`]; the only fatal error is a storage root that cannot
    /// be created. The orphan reaper runs once at the end and never after a
    /// cancelled run.
    pub async fn run(self, cancel: CancellationToken) -> SyncResult<MirrorSummary> {
        tokio::fs::create_dir_all(&self.config.root)
            .await
            .map_err(|e| SyncError::filesystem(&self.config.root, e))?;

        let mut summary = MirrorSummary::default();

        for target in &self.config.targets {
            if cancel.is_cancelled() {
                break;
            }

            info!(url = %target.url, dist = %target.dist, "Starting distribution mirror");
            summary.distributions += 1;

            match self.mirror_distribution(target, &cancel, &mut summary).await {
                Ok(()) => {}
                Err(SyncError::Cancelled) => break,
                Err(e) => {
                    error!(dist = %target.dist, error = %e, "Failed to mirror distribution");
                }
            }
        }

        summary.cancelled = cancel.is_cancelled();

        if summary.cancelled {
            info!("Run cancelled, skipping orphan cleanup");
        } else {
            let root = self.config.root.clone();
            let valid = Arc::clone(&self.valid_paths);
            match tokio::task::spawn_blocking(move || OrphanReaper::new().reap(&root, &valid)).await
            {
                Ok(Ok(removed)) => summary.orphans_removed = removed,
                Ok(Err(e)) => warn!(error = %e, "Error during orphan cleanup"),
                Err(e) => warn!(error = %e, "Orphan cleanup task failed"),
            }
        }

        info!(
            distributions = summary.distributions,
            records = summary.records_seen,
            committed = summary.committed,
            kept = summary.kept,
            failed = summary.failed,
            orphans_removed = summary.orphans_removed,
            cancelled = summary.cancelled,
            "Mirror complete"
        );

        Ok(summary)
    }

    /// Mirrors one distribution: trust roots, indexes, package payloads.
    async fn mirror_distribution(
        &self,
        target: &DistributionTarget,
        cancel: &CancellationToken,
        summary: &mut MirrorSummary,
    ) -> SyncResult<()> {
        let dist_dir = self.config.dist_dir(&target.dist);

        // Trust roots are mirrored verbatim so clients can verify upstream
        // signatures themselves. No checksum is known for them yet, and a
        // failed fetch is survivable as long as a local Release exists.
        for name in TRUST_ROOT_FILES {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let url = format!("{}/dists/{}/{}", target.url, target.dist, name);
            match self.fetcher.fetch(&url, &dist_dir.join(name), None).await {
                Ok(_) => debug!(file = name, "Fetched metadata"),
                Err(e) => warn!(file = name, error = %e, "Metadata fetch failed"),
            }
        }

        // Index discovery works off the local copy just written, so what we
        // enumerate is exactly what we stored.
        let release_path = dist_dir.join("Release");
        let manifest = tokio::fs::read_to_string(&release_path)
            .await
            .map_err(|e| SyncError::filesystem(&release_path, e))?;

        let filter = IndexFilter::for_target(target);
        let indices = parse_index_paths(&manifest, &filter);
        info!(dist = %target.dist, indices = indices.len(), "Discovered index files");

        for rel in &indices {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            info!(index = %rel, "Processing index");
            let url = format!("{}/dists/{}/{}", target.url, target.dist, rel);
            let dest = dist_dir.join(rel);

            let digest = match self.fetcher.fetch(&url, &dest, None).await {
                Ok(digest) => digest,
                Err(e) => {
                    warn!(index = %rel, error = %e, "Failed to download index");
                    continue;
                }
            };

            if let Err(e) = self.aliaser.publish(&dest, &digest).await {
                warn!(index = %rel, error = %e, "Failed to publish by-hash alias");
            }

            // Only package lists name pool content; translations and
            // command indexes are mirrored as opaque files.
            if rel.contains("Packages") {
                self.process_package_index(target, &dest, cancel, summary)
                    .await;
            }
        }

        Ok(())
    }

    /// Decodes one package list and runs its records through the pipeline.
    async fn process_package_index(
        &self,
        target: &DistributionTarget,
        index_path: &Path,
        cancel: &CancellationToken,
        summary: &mut MirrorSummary,
    ) {
        let decode_path = index_path.to_path_buf();
        let decoded =
            tokio::task::spawn_blocking(move || decode_package_index(&decode_path)).await;

        let records = match decoded {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                error!(index = %index_path.display(), error = %e, "Error parsing index");
                return;
            }
            Err(e) => {
                error!(index = %index_path.display(), error = %e, "Index decode task failed");
                return;
            }
        };

        info!(packages = records.len(), "Checking pool");

        // Every referenced path counts as valid for the reaper, whether or
        // not its download later succeeds.
        for record in &records {
            self.valid_paths.insert(record.filename.clone());
        }
        summary.records_seen += records.len();
        self.progress.add_total(records.len());

        let report = self
            .pipeline
            .process(&target.url, &self.config.root, records, cancel)
            .await;

        summary.kept += report.kept;
        summary.committed += report.committed;
        summary.failed += report.failed;

        debug!(
            kept = report.kept,
            committed = report.committed,
            failed = report.failed,
            "Index processed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::tests::MockTransport;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use sha2::{Digest, Sha256};
    use std::io::Write;
    use tempfile::TempDir;

    fn gz(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn hex_sha256(data: &[u8]) -> String {
        format!("{:x}", Sha256::digest(data))
    }

    fn bookworm_target(url: &str) -> DistributionTarget {
        DistributionTarget::new(url, "bookworm")
            .with_component("main")
            .with_architecture("amd64")
            .with_language("en")
    }

    /// Release manifest with one SHA256 entry per given path.
    fn release_manifest(paths: &[&str]) -> String {
        let mut manifest = String::from("Origin: Debian\nCodename: bookworm\nSHA256:\n");
        for path in paths {
            manifest.push_str(&format!(" 0011223344 12345 {}\n", path));
        }
        manifest
    }

    fn packages_index(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut text = String::new();
        for (filename, payload) in entries {
            text.push_str(&format!(
                "Package: demo\nFilename: {}\nSHA256: {}\n\n",
                filename,
                hex_sha256(payload)
            ));
        }
        gz(text.as_bytes())
    }

    /// Mock upstream with one distribution, one package index, one package.
    fn single_package_upstream(payload: &[u8]) -> MockTransport {
        let index = packages_index(&[("pool/main/d/demo/demo_1.0_amd64.deb", payload)]);
        MockTransport::new()
            .with_body(
                "http://mirror.test/debian/dists/bookworm/Release",
                release_manifest(&["main/binary-amd64/Packages.gz"]).into_bytes(),
            )
            .with_body(
                "http://mirror.test/debian/dists/bookworm/main/binary-amd64/Packages.gz",
                index,
            )
            .with_body(
                "http://mirror.test/debian/pool/main/d/demo/demo_1.0_amd64.deb",
                payload.to_vec(),
            )
    }

    #[tokio::test]
    async fn test_full_distribution_mirror() {
        let dir = TempDir::new().unwrap();
        let payload = b"demo package payload";
        let index_bytes = packages_index(&[("pool/main/d/demo/demo_1.0_amd64.deb", payload)]);

        let config = MirrorConfig::new(dir.path())
            .with_target(bookworm_target("http://mirror.test/debian"));
        let orchestrator = MirrorOrchestrator::with_transport(
            config,
            Arc::new(single_package_upstream(payload)),
        );

        let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.distributions, 1);
        assert_eq!(summary.records_seen, 1);
        assert_eq!(summary.committed, 1);
        assert_eq!(summary.kept, 0);
        assert_eq!(summary.failed, 0);
        assert!(!summary.cancelled);

        let dist = dir.path().join("dists/bookworm");
        assert!(dist.join("Release").exists());
        // InRelease and Release.gpg were 404 upstream: warned, not written.
        assert!(!dist.join("InRelease").exists());
        assert_eq!(
            std::fs::read(dir.path().join("pool/main/d/demo/demo_1.0_amd64.deb")).unwrap(),
            payload
        );

        let alias = dist
            .join("main/binary-amd64/by-hash/SHA256")
            .join(hex_sha256(&index_bytes));
        assert_eq!(std::fs::read(alias).unwrap(), index_bytes);
    }

    #[tokio::test]
    async fn test_unreadable_release_fails_distribution_only() {
        let dir = TempDir::new().unwrap();
        let payload = b"demo package payload";

        // First target's upstream serves nothing; its Release can never be
        // read locally. The second target works.
        let mock = single_package_upstream(payload);
        let config = MirrorConfig::new(dir.path())
            .with_target(
                DistributionTarget::new("http://mirror.test/void", "trixie")
                    .with_component("main")
                    .with_architecture("amd64"),
            )
            .with_target(bookworm_target("http://mirror.test/debian"));
        let orchestrator = MirrorOrchestrator::with_transport(config, Arc::new(mock));

        let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.distributions, 2);
        assert_eq!(summary.committed, 1);
    }

    #[tokio::test]
    async fn test_index_fetch_failure_skips_index_only() {
        let dir = TempDir::new().unwrap();
        let translation = b"translation text";

        let mock = MockTransport::new()
            .with_body(
                "http://mirror.test/debian/dists/bookworm/Release",
                release_manifest(&[
                    "main/binary-amd64/Packages.gz",
                    "main/i18n/Translation-en.bz2",
                ])
                .into_bytes(),
            )
            // Packages.gz is absent upstream (404); Translation works.
            .with_body(
                "http://mirror.test/debian/dists/bookworm/main/i18n/Translation-en.bz2",
                translation.to_vec(),
            );

        let config = MirrorConfig::new(dir.path())
            .with_target(bookworm_target("http://mirror.test/debian"));
        let orchestrator = MirrorOrchestrator::with_transport(config, Arc::new(mock));

        let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.records_seen, 0);
        let translation_path = dir.path().join("dists/bookworm/main/i18n/Translation-en.bz2");
        assert_eq!(std::fs::read(&translation_path).unwrap(), translation);

        // Translations get by-hash aliases like any other index.
        let alias = dir
            .path()
            .join("dists/bookworm/main/i18n/by-hash/SHA256")
            .join(hex_sha256(translation));
        assert!(alias.exists());
    }

    #[tokio::test]
    async fn test_finished_run_reaps_orphans() {
        let dir = TempDir::new().unwrap();
        let payload = b"demo package payload";

        // A package from an earlier run that upstream no longer references.
        let orphan = dir.path().join("pool/main/o/old_0.9_amd64.deb");
        std::fs::create_dir_all(orphan.parent().unwrap()).unwrap();
        std::fs::write(&orphan, b"old").unwrap();

        let config = MirrorConfig::new(dir.path())
            .with_target(bookworm_target("http://mirror.test/debian"));
        let orchestrator = MirrorOrchestrator::with_transport(
            config,
            Arc::new(single_package_upstream(payload)),
        );

        let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.orphans_removed, 1);
        assert!(!orphan.exists());
        assert!(dir.path().join("pool/main/d/demo/demo_1.0_amd64.deb").exists());
    }

    #[tokio::test]
    async fn test_failed_download_still_protects_stale_file() {
        let dir = TempDir::new().unwrap();
        let payload = b"demo package payload";

        // A stale copy that fails verification; upstream refuses the refetch.
        let stale = dir.path().join("pool/main/d/demo/demo_1.0_amd64.deb");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, b"stale bytes").unwrap();

        let mock = MockTransport::new()
            .with_body(
                "http://mirror.test/debian/dists/bookworm/Release",
                release_manifest(&["main/binary-amd64/Packages.gz"]).into_bytes(),
            )
            .with_body(
                "http://mirror.test/debian/dists/bookworm/main/binary-amd64/Packages.gz",
                packages_index(&[("pool/main/d/demo/demo_1.0_amd64.deb", payload)]),
            )
            .with_status(
                "http://mirror.test/debian/pool/main/d/demo/demo_1.0_amd64.deb",
                503,
            );

        let config = MirrorConfig::new(dir.path())
            .with_target(bookworm_target("http://mirror.test/debian"));
        let orchestrator = MirrorOrchestrator::with_transport(config, Arc::new(mock));

        let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.orphans_removed, 0);
        // The path was referenced upstream, so the stale copy is not an
        // orphan even though its refetch failed.
        assert_eq!(std::fs::read(&stale).unwrap(), b"stale bytes");
    }

    #[tokio::test]
    async fn test_cancelled_run_never_reaps() {
        let dir = TempDir::new().unwrap();

        let orphan = dir.path().join("pool/main/o/old_0.9_amd64.deb");
        std::fs::create_dir_all(orphan.parent().unwrap()).unwrap();
        std::fs::write(&orphan, b"old").unwrap();

        let config = MirrorConfig::new(dir.path())
            .with_target(bookworm_target("http://mirror.test/debian"));
        let orchestrator = MirrorOrchestrator::with_transport(
            config,
            Arc::new(single_package_upstream(b"demo package payload")),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = orchestrator.run(cancel).await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.distributions, 0);
        assert!(orphan.exists());
    }

    #[tokio::test]
    async fn test_progress_channel_closes_when_run_ends() {
        let dir = TempDir::new().unwrap();
        let config = MirrorConfig::new(dir.path())
            .with_target(bookworm_target("http://mirror.test/debian"));
        let orchestrator = MirrorOrchestrator::with_transport(
            config,
            Arc::new(single_package_upstream(b"demo package payload")),
        );

        let mut progress = orchestrator.subscribe();
        orchestrator.run(CancellationToken::new()).await.unwrap();

        // Sender side dropped with the orchestrator.
        while progress.changed().await.is_ok() {}
        assert_eq!(progress.borrow().downloaded, 1);
    }
}
