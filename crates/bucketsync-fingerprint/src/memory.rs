//! In-memory fingerprint store for tests and dry runs

use crate::FingerprintStore;
use async_trait::async_trait;
use bucketsync_types::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Fingerprint store backed by a process-local map.
///
/// Nothing persists across processes; useful for tests and for running the
/// pipeline against fixtures without touching real file attributes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<PathBuf, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked paths.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no paths are tracked.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl FingerprintStore for MemoryStore {
    async fn get(&self, path: &Path) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(path).cloned())
    }

    async fn set(&self, path: &Path, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(path.to_path_buf(), value.to_string());
        Ok(())
    }
}
