//! Remote inventory diffing
//!
//! Partitions one enumeration pass against the remote inventory. A local file
//! is *new* when no remote object shares its key, *changed* when a remote
//! counterpart exists but the stored fingerprint disagrees with the remote
//! hash, and *unchanged* otherwise.
//!
//! Two refinements on top of the plain partition:
//!
//! - **Backfill**: a file with a remote counterpart but no local fingerprint
//!   was almost certainly uploaded by an earlier, differently-configured run.
//!   Its fingerprint is repaired from the remote hash before classification,
//!   so it lands in *unchanged* instead of being re-uploaded. If the repair
//!   write fails the file stays fingerprint-less and classifies as *changed*,
//!   which costs one redundant upload and nothing else.
//! - **Exclusion**: the pattern only suppresses *new* uploads. Files the
//!   backup already tracks keep receiving incremental updates even when they
//!   match: hash drift must still be caught, only onboarding is blocked.

use crate::progress::ProgressReporter;
use bucketsync_fingerprint::FingerprintStore;
use bucketsync_types::{LocalFileRecord, RemoteObjectRecord};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Disjoint partition of one enumeration pass.
#[derive(Debug, Default)]
pub struct DiffOutcome {
    /// Files with no remote counterpart, queued for first upload
    pub to_upload: Vec<LocalFileRecord>,
    /// Files whose fingerprint matches the remote hash
    pub unchanged: Vec<LocalFileRecord>,
    /// Files whose fingerprint is missing-and-unrepairable or stale
    pub changed: Vec<LocalFileRecord>,
    /// New files suppressed by the exclusion pattern
    pub excluded: Vec<LocalFileRecord>,
    /// Paths whose missing fingerprint was repaired from the remote hash
    pub backfilled: Vec<PathBuf>,
}

impl DiffOutcome {
    /// Total number of enumerated files accounted for.
    pub fn total(&self) -> usize {
        self.to_upload.len() + self.unchanged.len() + self.changed.len() + self.excluded.len()
    }
}

/// Partition `local_files` against `remote_objects`.
///
/// The fingerprint store is only written for backfill repairs; a failed
/// repair is logged and degrades the file to *changed*.
pub async fn partition(
    local_files: Vec<LocalFileRecord>,
    remote_objects: &[RemoteObjectRecord],
    exclude: Option<&Regex>,
    fingerprints: &dyn FingerprintStore,
) -> DiffOutcome {
    let inventory: HashMap<&str, &RemoteObjectRecord> = remote_objects
        .iter()
        .map(|object| (object.key.as_str(), object))
        .collect();

    let mut outcome = DiffOutcome::default();
    for mut record in local_files {
        let Some(remote) = inventory.get(record.remote_key.as_str()) else {
            let is_excluded = exclude
                .is_some_and(|pattern| pattern.is_match(&record.local_path.to_string_lossy()));
            if is_excluded {
                outcome.excluded.push(record);
            } else {
                outcome.to_upload.push(record);
            }
            continue;
        };

        if record.fingerprint.is_none() {
            match fingerprints
                .set(&record.local_path, &remote.content_hash)
                .await
            {
                Ok(()) => {
                    debug!(
                        "backfilled missing fingerprint for '{}'",
                        record.local_path.display()
                    );
                    record.fingerprint = Some(remote.content_hash.clone());
                    outcome.backfilled.push(record.local_path.clone());
                }
                Err(e) => {
                    warn!(
                        "could not backfill fingerprint for '{}': {e}",
                        record.local_path.display()
                    );
                }
            }
        }

        match &record.fingerprint {
            Some(fingerprint) if *fingerprint == remote.content_hash => {
                outcome.unchanged.push(record);
            }
            _ => outcome.changed.push(record),
        }
    }

    outcome
}

/// Forward the diff's side observations (exclusions, backfills) as events.
pub(crate) async fn report(outcome: &DiffOutcome, reporter: &ProgressReporter) {
    for path in &outcome.backfilled {
        reporter.fingerprint_backfilled(path).await;
    }
    for record in &outcome.excluded {
        reporter.file_excluded(&record.local_path).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketsync_fingerprint::MemoryStore;
    use proptest::prelude::*;
    use std::path::Path;
    use std::time::SystemTime;

    fn local(path: &str, key: &str, fingerprint: Option<&str>) -> LocalFileRecord {
        LocalFileRecord {
            local_path: PathBuf::from(path),
            remote_key: key.to_string(),
            size: 1,
            modified: SystemTime::UNIX_EPOCH,
            fingerprint: fingerprint.map(String::from),
        }
    }

    fn remote(key: &str, hash: &str) -> RemoteObjectRecord {
        RemoteObjectRecord {
            key: key.to_string(),
            content_hash: hash.to_string(),
        }
    }

    #[tokio::test]
    async fn test_three_way_partition() {
        let store = MemoryStore::new();
        let locals = vec![
            local("/b/x.txt", "b/x.txt", None),
            local("/b/y.txt", "b/y.txt", Some("abc")),
            local("/b/z.txt", "b/z.txt", Some("old")),
        ];
        let remotes = vec![remote("b/y.txt", "abc"), remote("b/z.txt", "new")];

        let outcome = partition(locals, &remotes, None, &store).await;

        assert_eq!(outcome.to_upload[0].remote_key, "b/x.txt");
        assert_eq!(outcome.unchanged[0].remote_key, "b/y.txt");
        assert_eq!(outcome.changed[0].remote_key, "b/z.txt");
        assert_eq!(outcome.total(), 3);
    }

    #[tokio::test]
    async fn test_backfill_repairs_missing_fingerprint() {
        let store = MemoryStore::new();
        let locals = vec![local("/b/lost.txt", "b/lost.txt", None)];
        let remotes = vec![remote("b/lost.txt", "abc")];

        let outcome = partition(locals, &remotes, None, &store).await;

        // Backfilled and therefore unchanged, not re-uploaded.
        assert!(outcome.changed.is_empty());
        assert_eq!(outcome.unchanged.len(), 1);
        assert_eq!(outcome.backfilled, vec![PathBuf::from("/b/lost.txt")]);
        assert_eq!(
            store.get(Path::new("/b/lost.txt")).await.unwrap(),
            Some("abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_exclusion_only_suppresses_new_files() {
        let store = MemoryStore::new();
        let pattern = Regex::new(r"node_modules").unwrap();
        let locals = vec![
            local("/b/node_modules/new.js", "b/node_modules/new.js", None),
            local(
                "/b/node_modules/tracked.js",
                "b/node_modules/tracked.js",
                Some("stale"),
            ),
        ];
        let remotes = vec![remote("b/node_modules/tracked.js", "fresh")];

        let outcome = partition(locals, &remotes, Some(&pattern), &store).await;

        // Never-uploaded excluded file is not onboarded...
        assert_eq!(outcome.excluded.len(), 1);
        assert!(outcome.to_upload.is_empty());
        // ...but the already-tracked one still catches hash drift.
        assert_eq!(outcome.changed.len(), 1);
        assert_eq!(outcome.changed[0].remote_key, "b/node_modules/tracked.js");
    }

    proptest! {
        #[test]
        fn test_partition_is_complete_and_disjoint(
            files in proptest::collection::vec((any::<bool>(), any::<bool>(), any::<bool>()), 0..40)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            runtime.block_on(async {
                let store = MemoryStore::new();
                let mut locals = Vec::new();
                let mut remotes = Vec::new();
                for (i, (has_remote, has_fingerprint, matches)) in files.iter().enumerate() {
                    let key = format!("b/f{i}");
                    let fingerprint = has_fingerprint.then(|| {
                        if *matches { format!("h{i}") } else { "stale".to_string() }
                    });
                    locals.push(LocalFileRecord {
                        local_path: PathBuf::from(format!("/b/f{i}")),
                        remote_key: key.clone(),
                        size: 1,
                        modified: SystemTime::UNIX_EPOCH,
                        fingerprint,
                    });
                    if *has_remote {
                        remotes.push(RemoteObjectRecord {
                            key,
                            content_hash: format!("h{i}"),
                        });
                    }
                }

                let total = locals.len();
                let outcome = partition(locals, &remotes, None, &store).await;

                // Complete: every enumerated file lands in exactly one set.
                assert_eq!(outcome.total(), total);

                // Disjoint: no key appears in two sets.
                let mut seen = std::collections::HashSet::new();
                for record in outcome
                    .to_upload
                    .iter()
                    .chain(&outcome.unchanged)
                    .chain(&outcome.changed)
                    .chain(&outcome.excluded)
                {
                    assert!(seen.insert(record.remote_key.clone()));
                }
            });
        }
    }
}
