//! Persistent per-file content fingerprints
//!
//! A fingerprint is an opaque string attached to a local path, in practice
//! the server-confirmed content hash of the last successful upload. Comparing
//! it against the remote inventory detects drift without re-reading file
//! bytes on every pass.
//!
//! Absence is a valid, common state: a file that has never been uploaded (or
//! whose fingerprint was lost) simply has none, and the diff treats it
//! accordingly.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod memory;
#[cfg(unix)]
mod xattr_store;

pub use memory::MemoryStore;
#[cfg(unix)]
pub use xattr_store::XattrStore;

use async_trait::async_trait;
use bucketsync_types::Result;
use std::path::Path;
use std::sync::Arc;

/// Shared handle to a fingerprint store.
pub type FingerprintHandle = Arc<dyn FingerprintStore>;

/// Point-in-time-consistent key/value association keyed by absolute path.
///
/// `set` is idempotent: writing the same value twice has no additional
/// effect. Implementations must not fail the overall run when the backing
/// mechanism is unsupported: `get` reports "no fingerprint" instead, and a
/// failed `set` surfaces as the non-fatal
/// [`FingerprintWrite`](bucketsync_types::ErrorKind::FingerprintWrite) kind so
/// callers can log and move on.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Read the fingerprint stored for `path`, if any.
    async fn get(&self, path: &Path) -> Result<Option<String>>;

    /// Persist `value` as the fingerprint for `path`.
    async fn set(&self, path: &Path, value: &str) -> Result<()>;
}
