//! Core type system and error handling for bucketsync
//!
//! This crate provides the foundational types shared by every bucketsync
//! component:
//!
//! - **Error handling**: the error taxonomy for a backup pass, with fatality
//!   classification used by the run controller
//! - **Core types**: local file records, remote object records, write options
//!   and per-pass statistics
//! - **Retry policy**: bounded exponential backoff configuration for the
//!   whole-pass retry loop
//!
//! # Examples
//!
//! ```rust
//! use bucketsync_types::{Error, Result, BackupStats};
//!
//! fn example_operation() -> Result<BackupStats> {
//!     let mut stats = BackupStats::new();
//!     stats.files_uploaded = 10;
//!     stats.bytes_uploaded = 1024 * 1024;
//!     Ok(stats)
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::RetryPolicy;
pub use error::{Error, ErrorKind};
pub use types::{BackupStats, LocalFileRecord, RemoteObjectRecord, WriteOptions};

/// Result type alias used throughout bucketsync.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_creation() {
        let stats = BackupStats::new();
        assert_eq!(stats.files_uploaded, 0);
        assert_eq!(stats.bytes_uploaded, 0);
    }

    #[test]
    fn test_error_fatality() {
        let io_error = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        assert!(io_error.is_fatal());

        let tag_error = Error::fingerprint_write("xattr not supported");
        assert!(!tag_error.is_fatal());
    }
}
