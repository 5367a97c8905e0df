//! Local tree enumeration and remote-key mapping
//!
//! Walks the backup root depth-first and produces one [`LocalFileRecord`] per
//! regular file, with its remote object key and any fingerprint persisted by
//! an earlier pass. Traversal order is sorted by file name so the output is
//! deterministic for a given filesystem state.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use bucketsync_fingerprint::FingerprintHandle;
use bucketsync_types::{Error, LocalFileRecord, Result};
use std::path::{Component, Path};
use std::time::SystemTime;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Filesystem housekeeping entries the host OS scatters around; never backed up.
const HOUSEKEEPING: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Enumerates regular files under a backup root.
#[derive(Clone)]
pub struct Scanner {
    fingerprints: FingerprintHandle,
}

impl Scanner {
    /// Create a scanner that resolves stored fingerprints through `fingerprints`.
    pub fn new(fingerprints: FingerprintHandle) -> Self {
        Self { fingerprints }
    }

    /// Produce one record per regular file reachable under `root`.
    ///
    /// Fails with an I/O error if the root does not exist or any directory is
    /// unreadable; the caller gets either the complete enumeration or nothing.
    pub async fn scan(&self, root: &Path) -> Result<Vec<LocalFileRecord>> {
        if !root.is_dir() {
            return Err(Error::io(format!(
                "backup root is not a readable directory: {}",
                root.display()
            )));
        }
        let folder_name = root_folder_name(root)?;

        let mut records = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_housekeeping(entry.file_name().to_string_lossy().as_ref()));

        for entry in walker {
            let entry = entry.map_err(|e| Error::io(format!("enumeration failed: {e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let local_path = entry.path().to_path_buf();
            let metadata = entry
                .metadata()
                .map_err(|e| Error::io(format!("stat failed for '{}': {e}", local_path.display())))?;

            let remote_key = remote_key_for(&folder_name, root, &local_path)?;
            let fingerprint = self.fingerprints.get(&local_path).await?;

            debug!("enumerated {} -> {}", local_path.display(), remote_key);
            records.push(LocalFileRecord {
                local_path,
                remote_key,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                fingerprint,
            });
        }

        info!("enumerated {} files under '{}'", records.len(), root.display());
        Ok(records)
    }
}

/// Name of the root folder itself, used as the remote namespace prefix.
fn root_folder_name(root: &Path) -> Result<String> {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::config(format!(
                "backup root must be a named directory, got '{}'",
                root.display()
            ))
        })
}

/// Derive the remote key `<root folder name>/<relative path>` from path
/// segments. Always joined with `/` regardless of the host separator.
fn remote_key_for(folder_name: &str, root: &Path, local_path: &Path) -> Result<String> {
    let relative = local_path.strip_prefix(root).map_err(|_| {
        Error::io(format!(
            "enumerated path '{}' escaped the backup root",
            local_path.display()
        ))
    })?;

    let mut key = String::from(folder_name);
    for component in relative.components() {
        if let Component::Normal(segment) = component {
            key.push('/');
            key.push_str(segment.to_string_lossy().as_ref());
        }
    }
    Ok(key)
}

fn is_housekeeping(name: &str) -> bool {
    HOUSEKEEPING.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketsync_fingerprint::{FingerprintStore, MemoryStore};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn scanner_with_store() -> (Scanner, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Scanner::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_remote_key_mapping() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("myfolder");
        fs::create_dir_all(root.join("sub/inner")).unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("sub/inner/b.txt"), b"bb").unwrap();

        let (scanner, _) = scanner_with_store();
        let records = scanner.scan(&root).await.unwrap();

        let keys: Vec<&str> = records.iter().map(|r| r.remote_key.as_str()).collect();
        assert_eq!(keys, vec!["myfolder/a.txt", "myfolder/sub/inner/b.txt"]);
        assert_eq!(records[1].size, 2);
    }

    #[tokio::test]
    async fn test_housekeeping_entries_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("photos");
        fs::create_dir_all(root.join(".DS_Store")).unwrap();
        fs::write(root.join(".DS_Store").join("trapped.txt"), b"x").unwrap();
        fs::write(root.join("Thumbs.db"), b"x").unwrap();
        fs::write(root.join("keep.jpg"), b"x").unwrap();

        let (scanner, _) = scanner_with_store();
        let records = scanner.scan(&root).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].remote_key, "photos/keep.jpg");
    }

    #[tokio::test]
    async fn test_stored_fingerprint_is_attached() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("docs");
        fs::create_dir(&root).unwrap();
        let file = root.join("tracked.txt");
        fs::write(&file, b"content").unwrap();

        let (scanner, store) = scanner_with_store();
        store.set(&file, "abc").await.unwrap();

        let records = scanner.scan(&root).await.unwrap();
        assert_eq!(records[0].fingerprint, Some("abc".to_string()));
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let (scanner, _) = scanner_with_store();

        let result = scanner.scan(&temp_dir.path().join("absent")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_enumeration_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("tree");
        fs::create_dir_all(root.join("z")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        for name in ["z/1.txt", "a/2.txt", "m.txt"] {
            fs::write(root.join(name), b"x").unwrap();
        }

        let (scanner, _) = scanner_with_store();
        let first = scanner.scan(&root).await.unwrap();
        let second = scanner.scan(&root).await.unwrap();
        assert_eq!(first, second);
    }
}
