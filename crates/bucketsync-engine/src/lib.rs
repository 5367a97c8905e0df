//! Reconciliation and upload pipeline
//!
//! This crate ties the leaves together into one backup run:
//!
//! - **Diff Engine**: partitions enumerated local files into new / unchanged /
//!   changed relative to the remote inventory, with fingerprint backfill and
//!   an exclusion filter for never-uploaded files
//! - **Upload Pipeline**: drains a queue strictly one file at a time,
//!   streaming bytes to the remote store and persisting the server-confirmed
//!   hash on success
//! - **Run Controller**: drives one full pass (enumerate → fetch → diff →
//!   upload new → upload changed) and restarts the whole pass under a bounded
//!   retry policy when it fails
//! - **Progress**: event-channel progress reporting consumed by the CLI
//!
//! # Examples
//!
//! ```no_run
//! use bucketsync_engine::{BackupConfig, BackupEngine, ProgressReporter};
//! use bucketsync_fingerprint::XattrStore;
//! use bucketsync_remote::{GcsConfig, GcsStore};
//! use std::sync::Arc;
//!
//! # async fn example(gcs: GcsConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let remote = Arc::new(GcsStore::new(&gcs)?);
//! let fingerprints = Arc::new(XattrStore::new());
//! let config = BackupConfig::new("/home/me/photos")?;
//!
//! let engine = BackupEngine::new(remote, fingerprints, config);
//! let reporter = ProgressReporter::new();
//! let stats = engine.run(&reporter).await?;
//! println!("uploaded {} files", stats.files_transferred());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod controller;
pub mod diff;
pub mod progress;
pub mod upload;

pub use controller::{BackupConfig, BackupEngine};
pub use diff::DiffOutcome;
pub use progress::{BackupPhase, BackupProgress, ProgressEvent, ProgressReporter};
pub use upload::UploadPipeline;
