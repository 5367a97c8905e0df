//! Remote object store interface and backends
//!
//! The rest of bucketsync treats the bucket as an abstract key/value blob
//! service: list what exists under a prefix, stream bytes into a key, and
//! read back server-confirmed metadata. The [`GcsStore`] backend talks to
//! Google Cloud Storage; [`MemoryRemote`] keeps everything in a map for
//! tests.
//!
//! None of these operations retry internally; failures surface as
//! [`Remote`](bucketsync_types::ErrorKind::Remote) errors and the run
//! controller decides whether the whole pass restarts.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod gcs;
mod memory;

pub use gcs::{GcsConfig, GcsStore};
pub use memory::{hash_of, MemoryRemote};

use async_trait::async_trait;
use bucketsync_types::{RemoteObjectRecord, Result, WriteOptions};
use std::sync::Arc;

/// Shared handle to a remote store.
pub type RemoteHandle = Arc<dyn RemoteStore>;

/// Abstract key/value blob service the backup is reconciled against.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// List every object under `prefix` with its authoritative content hash.
    ///
    /// Pagination, if the backend has any, is fully drained before returning.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<RemoteObjectRecord>>;

    /// Fetch server-confirmed metadata for one object.
    async fn metadata(&self, key: &str) -> Result<RemoteObjectRecord>;

    /// Open a streamed writer for `key` with the run's write options.
    ///
    /// Nothing is guaranteed to be visible remotely until
    /// [`ObjectWriter::close`] succeeds; an abandoned writer may leave a
    /// partial object behind, which the next pass classifies as changed.
    async fn writer(&self, key: &str, options: &WriteOptions) -> Result<Box<dyn ObjectWriter>>;
}

/// Streamed write of one object, one chunk at a time.
#[async_trait]
pub trait ObjectWriter: Send {
    /// Append a chunk to the object body.
    async fn write(&mut self, chunk: &[u8]) -> Result<()>;

    /// Flush and commit the object.
    async fn close(self: Box<Self>) -> Result<()>;
}
