//! Run controller
//!
//! Drives one full pass (enumerate, fetch the remote inventory, diff, upload
//! new, upload changed) and restarts the *whole* pass under a bounded retry
//! policy when it fails. Restarting from scratch is safe: a pass reads the
//! live tree and the live inventory, so a half-finished previous pass only
//! shrinks the remaining work.

use crate::diff;
use crate::progress::{BackupPhase, ProgressReporter};
use crate::upload::UploadPipeline;
use bucketsync_fingerprint::FingerprintHandle;
use bucketsync_remote::RemoteHandle;
use bucketsync_scan::Scanner;
use bucketsync_types::{BackupStats, Error, Result, RetryPolicy, WriteOptions};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Per-run configuration for a [`BackupEngine`].
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Directory whose contents are backed up; its own name becomes the
    /// remote key prefix
    pub root: PathBuf,
    /// Pattern suppressing uploads of never-uploaded files
    pub exclude: Option<Regex>,
    /// Write options applied to every upload
    pub write_options: WriteOptions,
    /// Restart policy for failed passes
    pub retry: RetryPolicy,
}

impl BackupConfig {
    /// Create a configuration for `root` with default options.
    ///
    /// Fails when `root` has no final path component, since that name is the
    /// remote namespace every key lives under.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.file_name().is_none() {
            return Err(Error::config(format!(
                "backup root must be a named directory, got '{}'",
                root.display()
            )));
        }
        Ok(Self {
            root,
            exclude: None,
            write_options: WriteOptions::default(),
            retry: RetryPolicy::default(),
        })
    }

    /// Set the exclusion pattern.
    ///
    /// Fails when `pattern` is not a valid regular expression.
    pub fn with_exclude(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::config(format!("invalid exclusion pattern '{pattern}': {e}")))?;
        self.exclude = Some(regex);
        Ok(self)
    }

    /// Set the write options.
    #[must_use]
    pub fn with_write_options(mut self, options: WriteOptions) -> Self {
        self.write_options = options;
        self
    }

    /// Set the restart policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn prefix(&self) -> Result<String> {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::config(format!(
                    "backup root must be a named directory, got '{}'",
                    self.root.display()
                ))
            })
    }
}

/// Orchestrates backup passes against one remote store.
pub struct BackupEngine {
    remote: RemoteHandle,
    fingerprints: FingerprintHandle,
    config: BackupConfig,
}

impl BackupEngine {
    /// Create an engine for the given stores and configuration.
    pub fn new(remote: RemoteHandle, fingerprints: FingerprintHandle, config: BackupConfig) -> Self {
        Self {
            remote,
            fingerprints,
            config,
        }
    }

    /// The configured backup root.
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Run the backup until one pass completes, restarting failed passes
    /// under the configured retry policy.
    ///
    /// Non-retryable errors (configuration problems) terminate immediately.
    /// When the policy is exhausted the last pass error is returned.
    pub async fn run(&self, reporter: &ProgressReporter) -> Result<BackupStats> {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            match self.run_pass(reporter).await {
                Ok(mut stats) => {
                    stats.passes = attempt + 1;
                    stats.duration = start.elapsed();
                    reporter.completed(stats.clone()).await;
                    info!(
                        "backup of '{}' completed in {} pass(es)",
                        self.config.root.display(),
                        stats.passes
                    );
                    return Ok(stats);
                }
                Err(e) => {
                    reporter.pass_failed(e.to_string()).await;
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if attempt >= self.config.retry.max_retries {
                        warn!("giving up after {} failed pass(es): {e}", attempt + 1);
                        return Err(e);
                    }
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    warn!("pass {} failed: {e}; restarting in {:?}", attempt + 1, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run exactly one pass, with no restart on failure.
    pub async fn run_pass(&self, reporter: &ProgressReporter) -> Result<BackupStats> {
        let mut stats = BackupStats::new();

        reporter.set_phase(BackupPhase::Enumerating).await;
        let scanner = Scanner::new(Arc::clone(&self.fingerprints));
        let local_files = scanner.scan(&self.config.root).await?;

        reporter.set_phase(BackupPhase::FetchingRemote).await;
        let prefix = self.config.prefix()?;
        let remote_objects = self.remote.list(Some(&prefix)).await?;
        info!(
            "inventory for '{prefix}' on {}: {} objects",
            self.remote.name(),
            remote_objects.len()
        );

        reporter.set_phase(BackupPhase::Diffing).await;
        let outcome = diff::partition(
            local_files,
            &remote_objects,
            self.config.exclude.as_ref(),
            self.fingerprints.as_ref(),
        )
        .await;
        diff::report(&outcome, reporter).await;

        stats.files_unchanged = outcome.unchanged.len() as u64;
        stats.files_excluded = outcome.excluded.len() as u64;
        stats.fingerprints_backfilled = outcome.backfilled.len() as u64;

        let queued_files = (outcome.to_upload.len() + outcome.changed.len()) as u64;
        let queued_bytes: u64 = outcome
            .to_upload
            .iter()
            .chain(&outcome.changed)
            .map(|record| record.size)
            .sum();
        reporter.set_totals(queued_files, queued_bytes).await;

        let pipeline = UploadPipeline::new(
            self.remote.as_ref(),
            self.fingerprints.as_ref(),
            self.config.write_options.clone(),
        );

        reporter.set_phase(BackupPhase::UploadingNew).await;
        let uploaded = pipeline.drain(outcome.to_upload, reporter).await?;
        stats.files_uploaded = uploaded.files_uploaded;
        stats.bytes_uploaded += uploaded.bytes_uploaded;

        reporter.set_phase(BackupPhase::UploadingChanged).await;
        let reuploaded = pipeline.drain(outcome.changed, reporter).await?;
        stats.files_reuploaded = reuploaded.files_uploaded;
        stats.bytes_uploaded += reuploaded.bytes_uploaded;

        Ok(stats)
    }
}
