//! Progress tracking for backup runs

use bucketsync_types::BackupStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Run controller phases, in pass order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupPhase {
    /// Configuration validated, nothing started yet
    Idle,
    /// Walking the local tree
    Enumerating,
    /// Listing the remote inventory
    FetchingRemote,
    /// Partitioning local files against the inventory
    Diffing,
    /// Uploading files with no remote counterpart
    UploadingNew,
    /// Re-uploading files whose fingerprint drifted
    UploadingChanged,
    /// Pass finished successfully
    Done,
    /// Pass aborted; the controller decides whether to restart
    Failed,
}

/// Snapshot of a run's progress.
#[derive(Debug, Clone)]
pub struct BackupProgress {
    /// Identifier for this run
    pub run_id: uuid::Uuid,
    /// Current phase
    pub phase: BackupPhase,
    /// Remote key currently in flight, if any
    pub current_key: Option<String>,
    /// Files fully uploaded so far in the current pass
    pub files_completed: u64,
    /// Files queued for upload in the current pass
    pub files_total: u64,
    /// Payload bytes streamed so far
    pub bytes_completed: u64,
    /// Payload bytes queued for upload
    pub bytes_total: u64,
    /// When the run started
    pub start_time: Instant,
}

impl BackupProgress {
    fn new(run_id: uuid::Uuid) -> Self {
        Self {
            run_id,
            phase: BackupPhase::Idle,
            current_key: None,
            files_completed: 0,
            files_total: 0,
            bytes_completed: 0,
            bytes_total: 0,
            start_time: Instant::now(),
        }
    }

    /// Overall completion in percent, by bytes when known.
    pub fn overall_progress(&self) -> f64 {
        if self.bytes_total > 0 {
            (self.bytes_completed as f64 / self.bytes_total as f64) * 100.0
        } else if self.files_total > 0 {
            (self.files_completed as f64 / self.files_total as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Progress event types consumed by the CLI renderer.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The controller moved to a new phase
    PhaseChanged(BackupPhase),
    /// Totals for the upload queues are known
    TotalsKnown {
        /// Files queued for upload this pass
        files: u64,
        /// Bytes queued for upload this pass
        bytes: u64,
    },
    /// A file's upload began
    FileStarted {
        /// Remote key being written
        key: String,
        /// Payload size in bytes
        size: u64,
    },
    /// A chunk of the in-flight file reached the remote store
    BytesTransferred(u64),
    /// A file's upload finished and its fingerprint was persisted
    FileCompleted {
        /// Remote key that was written
        key: String,
        /// Payload size in bytes
        size: u64,
        /// Files completed so far in this queue
        completed: u64,
        /// Files still waiting in this queue
        remaining: u64,
    },
    /// A never-uploaded file matched the exclusion pattern
    FileExcluded(PathBuf),
    /// A missing fingerprint was repaired from the remote hash
    FingerprintBackfilled(PathBuf),
    /// The pass failed; the controller may restart it
    PassFailed(String),
    /// The run finished
    Completed(BackupStats),
}

/// Progress reporter shared between the engine and the CLI.
///
/// The engine never prints; it publishes events here and the consumer decides
/// how to render them. Dropping the receiver is fine; sends are best-effort.
#[derive(Debug)]
pub struct ProgressReporter {
    progress: Arc<RwLock<BackupProgress>>,
    event_tx: mpsc::UnboundedSender<ProgressEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<ProgressEvent>>,
}

impl ProgressReporter {
    /// Create a reporter for a fresh run.
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let progress = Arc::new(RwLock::new(BackupProgress::new(uuid::Uuid::new_v4())));

        Self {
            progress,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Get the current progress snapshot.
    pub async fn get_progress(&self) -> BackupProgress {
        self.progress.read().await.clone()
    }

    /// Take the event receiver (can only be taken once).
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<ProgressEvent>> {
        self.event_rx.take()
    }

    /// Update the current phase.
    pub async fn set_phase(&self, phase: BackupPhase) {
        {
            let mut progress = self.progress.write().await;
            progress.phase = phase;
        }
        debug!("phase changed to {:?}", phase);
        let _ = self.event_tx.send(ProgressEvent::PhaseChanged(phase));
    }

    /// Record how much work the upload queues hold.
    pub async fn set_totals(&self, files: u64, bytes: u64) {
        {
            let mut progress = self.progress.write().await;
            progress.files_total = files;
            progress.bytes_total = bytes;
            progress.files_completed = 0;
            progress.bytes_completed = 0;
        }
        let _ = self.event_tx.send(ProgressEvent::TotalsKnown { files, bytes });
    }

    /// Report that a file's upload began.
    pub async fn file_started(&self, key: &str, size: u64) {
        {
            let mut progress = self.progress.write().await;
            progress.current_key = Some(key.to_string());
        }
        let _ = self.event_tx.send(ProgressEvent::FileStarted {
            key: key.to_string(),
            size,
        });
    }

    /// Report bytes drained from the in-flight file's stream.
    pub async fn bytes_transferred(&self, bytes: u64) {
        {
            let mut progress = self.progress.write().await;
            progress.bytes_completed += bytes;
        }
        let _ = self.event_tx.send(ProgressEvent::BytesTransferred(bytes));
    }

    /// Report that a file's upload finished.
    pub async fn file_completed(&self, key: &str, size: u64, completed: u64, remaining: u64) {
        {
            let mut progress = self.progress.write().await;
            progress.files_completed += 1;
            progress.current_key = None;
        }
        let _ = self.event_tx.send(ProgressEvent::FileCompleted {
            key: key.to_string(),
            size,
            completed,
            remaining,
        });
    }

    /// Report a file suppressed by the exclusion pattern.
    pub async fn file_excluded(&self, path: &std::path::Path) {
        let _ = self
            .event_tx
            .send(ProgressEvent::FileExcluded(path.to_path_buf()));
    }

    /// Report a fingerprint repaired from the remote inventory.
    pub async fn fingerprint_backfilled(&self, path: &std::path::Path) {
        let _ = self
            .event_tx
            .send(ProgressEvent::FingerprintBackfilled(path.to_path_buf()));
    }

    /// Report a failed pass.
    pub async fn pass_failed(&self, error: String) {
        self.set_phase(BackupPhase::Failed).await;
        let _ = self.event_tx.send(ProgressEvent::PassFailed(error));
    }

    /// Report run completion.
    pub async fn completed(&self, stats: BackupStats) {
        self.set_phase(BackupPhase::Done).await;
        let _ = self.event_tx.send(ProgressEvent::Completed(stats));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ProgressReporter {
    fn clone(&self) -> Self {
        Self {
            progress: Arc::clone(&self.progress),
            event_tx: self.event_tx.clone(),
            event_rx: None, // Clone doesn't get the receiver
        }
    }
}
