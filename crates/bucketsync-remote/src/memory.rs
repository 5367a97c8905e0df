//! In-memory remote store for tests

use crate::{ObjectWriter, RemoteStore};
use async_trait::async_trait;
use bucketsync_types::{Error, RemoteObjectRecord, Result, WriteOptions};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_hash: String,
}

/// Remote store backed by a process-local map.
///
/// Content hashes are blake3 hex digests of the stored bytes, but tests can
/// preload objects with arbitrary hashes to model drift. Listing and write
/// failures can be injected to exercise the pass-restart path.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    failing_lists: AtomicU32,
    failing_writes: AtomicU32,
}

impl MemoryRemote {
    /// Create an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload an object whose content hash is derived from `data`.
    pub async fn insert(&self, key: &str, data: &[u8]) {
        let content_hash = hash_of(data);
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_hash,
            },
        );
    }

    /// Preload an object with an arbitrary content hash.
    pub async fn insert_with_hash(&self, key: &str, data: &[u8], content_hash: &str) {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_hash: content_hash.to_string(),
            },
        );
    }

    /// Make the next `count` calls to [`RemoteStore::list`] fail.
    pub fn fail_lists(&self, count: u32) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` writer openings fail.
    pub fn fail_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Number of stored objects.
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Raw bytes stored under `key`, if any.
    pub async fn data_of(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).map(|o| o.data.clone())
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

/// Hash used for objects written through this backend.
pub fn hash_of(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<RemoteObjectRecord>> {
        if Self::take_failure(&self.failing_lists) {
            return Err(Error::remote("injected listing failure"));
        }

        let objects = self.objects.read().await;
        let mut records: Vec<RemoteObjectRecord> = objects
            .iter()
            .filter(|(key, _)| match prefix {
                Some(prefix) => {
                    let prefix = prefix.trim_end_matches('/');
                    key.strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
                }
                None => true,
            })
            .map(|(key, object)| RemoteObjectRecord {
                key: key.clone(),
                content_hash: object.content_hash.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn metadata(&self, key: &str) -> Result<RemoteObjectRecord> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| RemoteObjectRecord {
                key: key.to_string(),
                content_hash: object.content_hash.clone(),
            })
            .ok_or_else(|| Error::remote(format!("no such object: {key}")))
    }

    async fn writer(&self, key: &str, _options: &WriteOptions) -> Result<Box<dyn ObjectWriter>> {
        if Self::take_failure(&self.failing_writes) {
            return Err(Error::remote("injected write failure"));
        }

        Ok(Box::new(MemoryWriter {
            key: key.to_string(),
            buffer: Vec::new(),
            objects: Arc::clone(&self.objects),
        }))
    }
}

struct MemoryWriter {
    key: String,
    buffer: Vec<u8>,
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[async_trait]
impl ObjectWriter for MemoryWriter {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let content_hash = hash_of(&self.buffer);
        self.objects.write().await.insert(
            self.key,
            StoredObject {
                data: self.buffer,
                content_hash,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_list() {
        let remote = MemoryRemote::new();
        let options = WriteOptions::default();

        let mut writer = remote.writer("backup/a.txt", &options).await.unwrap();
        writer.write(b"hello ").await.unwrap();
        writer.write(b"world").await.unwrap();
        writer.close().await.unwrap();

        let records = remote.list(Some("backup")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "backup/a.txt");
        assert_eq!(records[0].content_hash, hash_of(b"hello world"));
        assert_eq!(remote.data_of("backup/a.txt").await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_prefix_filtering() {
        let remote = MemoryRemote::new();
        remote.insert("backup/a.txt", b"a").await;
        remote.insert("backups-other/b.txt", b"b").await;

        let records = remote.list(Some("backup")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "backup/a.txt");

        let all = remote.list(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_metadata_after_close() {
        let remote = MemoryRemote::new();
        remote.insert("k/x", b"payload").await;

        let meta = remote.metadata("k/x").await.unwrap();
        assert_eq!(meta.content_hash, hash_of(b"payload"));
        assert!(remote.metadata("k/missing").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let remote = MemoryRemote::new();
        remote.fail_lists(1);

        assert!(remote.list(None).await.is_err());
        assert!(remote.list(None).await.is_ok());
    }
}
