//! Core data types for the reconciliation and upload pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// One regular file found under the backup root.
///
/// Records are rebuilt fresh on every pass by walking the tree; the only
/// durable local state is `fingerprint`, which survives between runs inside
/// the fingerprint store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFileRecord {
    /// Absolute filesystem path, unique per record
    pub local_path: PathBuf,
    /// Object key under which this file lives remotely:
    /// `<root folder name>/<path relative to the root>`
    pub remote_key: String,
    /// File size in bytes, used for progress accounting only
    pub size: u64,
    /// Last observed modification time, used for display only
    pub modified: SystemTime,
    /// Content fingerprint persisted by a previous pass, if any.
    /// `None` means "never uploaded or fingerprint lost".
    pub fingerprint: Option<String>,
}

/// One object that already exists in the remote bucket.
///
/// Fetched fresh on every pass and never persisted locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObjectRecord {
    /// Remote object identifier
    pub key: String,
    /// Server-computed content hash, authoritative
    pub content_hash: String,
}

/// Fixed write options applied to every upload of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Gzip the byte stream before it reaches the remote store
    pub compress: bool,
    /// Storage class requested for uploaded objects (e.g. `COLDLINE`)
    pub storage_class: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compress: true,
            storage_class: "COLDLINE".to_string(),
        }
    }
}

/// Statistics for one completed backup run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupStats {
    /// Files uploaded because no remote counterpart existed
    pub files_uploaded: u64,
    /// Files re-uploaded because their fingerprint drifted from the remote hash
    pub files_reuploaded: u64,
    /// Files skipped because local and remote agreed
    pub files_unchanged: u64,
    /// New files suppressed by the exclusion pattern
    pub files_excluded: u64,
    /// Missing fingerprints backfilled from the remote inventory
    pub fingerprints_backfilled: u64,
    /// Total payload bytes streamed to the remote store
    pub bytes_uploaded: u64,
    /// Number of passes attempted, including the successful one
    pub passes: u32,
    /// Wall-clock duration of the whole run
    pub duration: Duration,
}

impl BackupStats {
    /// Create empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of files that were transferred this run
    pub fn files_transferred(&self) -> u64 {
        self.files_uploaded + self.files_reuploaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_options_default() {
        let options = WriteOptions::default();
        assert!(options.compress);
        assert_eq!(options.storage_class, "COLDLINE");
    }

    #[test]
    fn test_files_transferred() {
        let stats = BackupStats {
            files_uploaded: 3,
            files_reuploaded: 2,
            ..BackupStats::new()
        };
        assert_eq!(stats.files_transferred(), 5);
    }
}
