//! Two-stage worker pipeline for package payloads.
//!
//! Each package index yields a batch of records. The batch flows through two
//! bounded worker pools:
//!
//! ```text
//! records ──► ┌──────────────┐  needs download  ┌──────────────┐
//!             │ Stage A      │ ───────────────► │ Stage B      │
//!             │ verify local │                  │ fetch+commit │
//!             │ (W workers)  │  kept (match)    │ (W workers)  │
//!             └──────────────┘ ──► tally        └──────────────┘
//! ```
//!
//! Stage A stats each record's local path and hashes existing files; only
//! records that are missing or fail verification become download tasks. The
//! task channel is closed once every Stage A worker has finished, so Stage B
//! sees a complete, fixed batch. Both stages check the cancellation token at
//! dequeue time, which lets in-flight work finish while draining the rest.

pub mod checksum;

mod fetcher;
mod progress;

pub use fetcher::Fetcher;
pub use progress::{ProgressSnapshot, ProgressTracker};

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::index::PackageRecord;

/// A payload that Stage A decided must be fetched.
#[derive(Debug, Clone)]
struct DownloadTask {
    url: String,
    dest: PathBuf,
    checksum: String,
}

/// Outcome tallies for one batch of records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// Records whose local file already matched its checksum.
    pub kept: usize,
    /// Records downloaded and committed this run.
    pub committed: usize,
    /// Records that could not be downloaded or verified.
    pub failed: usize,
}

impl PipelineReport {
    /// Folds another batch's tallies into this one.
    pub fn merge(&mut self, other: PipelineReport) {
        self.kept += other.kept;
        self.committed += other.committed;
        self.failed += other.failed;
    }
}

/// Runs record batches through the verify and download stages.
#[derive(Clone)]
pub struct PackagePipeline {
    fetcher: Fetcher,
    workers: usize,
    progress: Arc<ProgressTracker>,
}

impl PackagePipeline {
    pub fn new(fetcher: Fetcher, workers: usize, progress: Arc<ProgressTracker>) -> Self {
        Self {
            fetcher,
            workers: workers.max(1),
            progress,
        }
    }

    /// Processes one index's records end to end.
    ///
    /// `base_url` is the repository root (no trailing slash); each record's
    /// `filename` is appended to it for the download URL and joined under
    /// `root` for the local path. Failures are tallied, never propagated:
    /// one bad payload must not stop the rest of the batch.
    pub async fn process(
        &self,
        base_url: &str,
        root: &Path,
        records: Vec<PackageRecord>,
        cancel: &CancellationToken,
    ) -> PipelineReport {
        if records.is_empty() {
            return PipelineReport::default();
        }

        let capacity = records.len();
        let (kept, tasks) = self.verify_stage(base_url, root, records, capacity, cancel).await;

        if tasks.is_empty() {
            debug!(kept, "All packages already current");
            return PipelineReport {
                kept,
                ..PipelineReport::default()
            };
        }

        info!(
            downloads = tasks.len(),
            workers = self.workers,
            "Queuing downloads"
        );

        let (committed, failed) = self.download_stage(tasks, cancel).await;

        PipelineReport {
            kept,
            committed,
            failed,
        }
    }

    /// Stage A: decide, per record, whether the local copy can be kept.
    ///
    /// Returns the kept count and the download tasks. The task list is only
    /// complete when the run was not cancelled; a cancelled run simply
    /// surfaces fewer tasks for Stage B to drain.
    async fn verify_stage(
        &self,
        base_url: &str,
        root: &Path,
        records: Vec<PackageRecord>,
        capacity: usize,
        cancel: &CancellationToken,
    ) -> (usize, Vec<DownloadTask>) {
        let queue = Arc::new(Mutex::new(VecDeque::from(records)));
        let (task_tx, mut task_rx) = mpsc::channel::<DownloadTask>(capacity);
        let kept = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let queue = Arc::clone(&queue);
            let task_tx = task_tx.clone();
            let kept = Arc::clone(&kept);
            let cancel = cancel.clone();
            let base_url = base_url.to_string();
            let root = root.to_path_buf();

            workers.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let Some(record) = next_job(&queue) else {
                        return;
                    };

                    let dest = root.join(&record.filename);
                    if !needs_download(worker_id, &record, &dest).await {
                        kept.fetch_add(1, Ordering::SeqCst);
                        continue;
                    }

                    let task = DownloadTask {
                        url: format!("{}/{}", base_url, record.filename),
                        dest,
                        checksum: record.sha256,
                    };
                    // Capacity covers the whole batch, so this only fails if
                    // the receiver side is gone.
                    if task_tx.send(task).await.is_err() {
                        return;
                    }
                }
            }));
        }
        // Workers hold the remaining clones; the channel closes when the
        // last one exits.
        drop(task_tx);

        join_all(workers).await;

        let mut tasks = Vec::new();
        while let Some(task) = task_rx.recv().await {
            tasks.push(task);
        }

        (kept.load(Ordering::SeqCst), tasks)
    }

    /// Stage B: fetch every task, tallying commits and failures.
    async fn download_stage(
        &self,
        tasks: Vec<DownloadTask>,
        cancel: &CancellationToken,
    ) -> (usize, usize) {
        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let committed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let queue = Arc::clone(&queue);
            let committed = Arc::clone(&committed);
            let failed = Arc::clone(&failed);
            let cancel = cancel.clone();
            let fetcher = self.fetcher.clone();
            let progress = Arc::clone(&self.progress);

            workers.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let Some(task) = next_job(&queue) else {
                        return;
                    };

                    let file_name = task
                        .dest
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();

                    match fetcher.fetch(&task.url, &task.dest, Some(&task.checksum)).await {
                        Ok(_) => {
                            debug!(worker_id, file = %file_name, "Downloaded");
                            committed.fetch_add(1, Ordering::SeqCst);
                            progress.record_download(&file_name);
                        }
                        Err(e) => {
                            warn!(worker_id, file = %file_name, error = %e, "Download failed");
                            failed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
            }));
        }

        join_all(workers).await;

        (
            committed.load(Ordering::SeqCst),
            failed.load(Ordering::SeqCst),
        )
    }
}

/// Pops the next job while keeping the lock scope away from await points.
fn next_job<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue.lock().pop_front()
}

/// Decides whether a record's payload must be fetched.
///
/// Missing file, checksum mismatch, and verification errors all schedule a
/// download; only a clean hash match keeps the local copy.
async fn needs_download(worker_id: usize, record: &PackageRecord, dest: &Path) -> bool {
    if tokio::fs::metadata(dest).await.is_err() {
        return true;
    }

    debug!(worker_id, file = %record.filename, "Verifying existing file");
    let path = dest.to_path_buf();
    let expected = record.sha256.clone();
    let verified = tokio::task::spawn_blocking(move || checksum::file_matches(&path, &expected)).await;

    match verified {
        Ok(Ok(true)) => {
            debug!(worker_id, file = %record.filename, "Checksum match, keeping local copy");
            false
        }
        Ok(Ok(false)) => {
            info!(worker_id, file = %record.filename, "Checksum mismatch, scheduling refetch");
            true
        }
        Ok(Err(e)) => {
            warn!(worker_id, file = %record.filename, error = %e, "Could not verify, scheduling refetch");
            true
        }
        Err(e) => {
            warn!(worker_id, file = %record.filename, error = %e, "Verification task failed, scheduling refetch");
            true
        }
    }
}
