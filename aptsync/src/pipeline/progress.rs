//! Progress reporting for a mirror run.
//!
//! Workers bump atomic counters and publish a [`ProgressSnapshot`] into a
//! single-slot watch channel. Publication never blocks: a new snapshot
//! overwrites the previous one, so consumers that poll slowly simply miss
//! intermediate values. This is a monitoring signal, not an audit trail.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

/// Point-in-time view of a run's progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Packages committed so far.
    pub downloaded: usize,
    /// Packages seen so far across all processed indexes. Grows as indexes
    /// are decoded.
    pub total: usize,
    /// File name of the most recently committed package.
    pub current_file: String,
}

/// Shared progress state, updated by download workers.
#[derive(Debug)]
pub struct ProgressTracker {
    downloaded: AtomicUsize,
    total: AtomicUsize,
    sender: watch::Sender<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ProgressSnapshot::default());
        Self {
            downloaded: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            sender,
        }
    }

    /// Subscribe to snapshot updates. The channel closes when the tracker
    /// is dropped, which ends the run's progress stream.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.sender.subscribe()
    }

    /// Grow the expected total as another index's records are counted.
    pub fn add_total(&self, count: usize) {
        self.total.fetch_add(count, Ordering::SeqCst);
        let snapshot = ProgressSnapshot {
            total: self.total.load(Ordering::SeqCst),
            ..self.sender.borrow().clone()
        };
        self.sender.send_replace(snapshot);
    }

    /// Record one committed download and publish the new snapshot.
    pub fn record_download(&self, file_name: &str) {
        let downloaded = self.downloaded.fetch_add(1, Ordering::SeqCst) + 1;
        self.sender.send_replace(ProgressSnapshot {
            downloaded,
            total: self.total.load(Ordering::SeqCst),
            current_file: file_name.to_string(),
        });
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.sender.borrow().clone()
    }

    /// Packages committed so far.
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Packages seen so far.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
