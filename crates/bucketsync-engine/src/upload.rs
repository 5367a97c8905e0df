//! Sequential streamed upload pipeline
//!
//! Exactly one file is in flight at any time. That is a deliberate
//! backpressure choice: throughput is bounded by the slowest link anyway, and
//! a single-consumer loop keeps progress reporting and fingerprint writes
//! trivially ordered. The queue is drained from the tail, so upload order is
//! the reverse of enumeration order.

use crate::progress::ProgressReporter;
use bucketsync_fingerprint::FingerprintStore;
use bucketsync_remote::RemoteStore;
use bucketsync_types::{Error, LocalFileRecord, Result, WriteOptions};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

/// Read buffer for streaming local files.
const READ_CHUNK_SIZE: usize = 256 * 1024;

/// Bytes and files moved by one pipeline invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOutcome {
    /// Files fully uploaded and confirmed
    pub files_uploaded: u64,
    /// Payload bytes streamed
    pub bytes_uploaded: u64,
}

/// Drains a queue of local files into the remote store, one at a time.
pub struct UploadPipeline<'a> {
    remote: &'a dyn RemoteStore,
    fingerprints: &'a dyn FingerprintStore,
    options: WriteOptions,
}

impl<'a> UploadPipeline<'a> {
    /// Create a pipeline with the run's fixed write options.
    pub fn new(
        remote: &'a dyn RemoteStore,
        fingerprints: &'a dyn FingerprintStore,
        options: WriteOptions,
    ) -> Self {
        Self {
            remote,
            fingerprints,
            options,
        }
    }

    /// Upload every queued file, strictly sequentially.
    ///
    /// The first open/stream/commit/metadata failure rejects the whole
    /// invocation. Files uploaded before the failure keep their confirmed
    /// fingerprints; a partially-written remote object is left behind and the
    /// next pass reclassifies it as changed.
    pub async fn drain(
        &self,
        mut queue: Vec<LocalFileRecord>,
        reporter: &ProgressReporter,
    ) -> Result<UploadOutcome> {
        let mut outcome = UploadOutcome::default();

        while let Some(record) = queue.pop() {
            reporter.file_started(&record.remote_key, record.size).await;
            self.upload_one(&record, reporter).await?;

            outcome.files_uploaded += 1;
            outcome.bytes_uploaded += record.size;
            reporter
                .file_completed(
                    &record.remote_key,
                    record.size,
                    outcome.files_uploaded,
                    queue.len() as u64,
                )
                .await;
        }

        info!(
            "pipeline drained: {} files, {} bytes",
            outcome.files_uploaded, outcome.bytes_uploaded
        );
        Ok(outcome)
    }

    async fn upload_one(&self, record: &LocalFileRecord, reporter: &ProgressReporter) -> Result<()> {
        let mut file = File::open(&record.local_path).await.map_err(|e| {
            Error::io(format!(
                "failed to open '{}': {e}",
                record.local_path.display()
            ))
        })?;

        let mut writer = self.remote.writer(&record.remote_key, &self.options).await?;
        let mut buffer = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let read = file.read(&mut buffer).await.map_err(|e| {
                Error::io(format!(
                    "failed to read '{}': {e}",
                    record.local_path.display()
                ))
            })?;
            if read == 0 {
                break;
            }
            writer.write(&buffer[..read]).await?;
            reporter.bytes_transferred(read as u64).await;
        }
        writer.close().await?;

        // The server's hash is authoritative; persisting it is what lets the
        // next pass skip this file.
        let confirmed = self.remote.metadata(&record.remote_key).await?;
        if let Err(e) = self
            .fingerprints
            .set(&record.local_path, &confirmed.content_hash)
            .await
        {
            // Upload already succeeded; losing the cache write only means one
            // redundant re-upload on some future pass.
            warn!(
                "fingerprint write failed for '{}': {e}",
                record.local_path.display()
            );
        }
        Ok(())
    }
}
