//! Persistent cache index: which locations are cached, and where.
//!
//! The index is a single JSON document at `<cache_dir>/resource-at-url.json`:
//!
//! ```json
//! { "version": 1, "entries": { "https://…/client.jar": { "cached_file": "files/…", … } } }
//! ```
//!
//! It is loaded fully into memory when opened and rewritten wholesale on every
//! update (atomic write via tmp + rename).
//!
//! # Consistency
//!
//! Readers take an immutable [`IndexSnapshot`]. Writers build a complete
//! replacement map from the snapshot they observed and install it with
//! [`CacheIndex::update`]. Two racing updates are last-write-wins: an entry
//! written by the loser for an unrelated key is dropped. That only costs a
//! redundant fetch later, so updates are not merged. A failed write leaves
//! the in-memory snapshot untouched.
//!
//! Each update writes the file and swaps the snapshot as one step, under a
//! writer lock, inside a blocking task. Whichever update wins on disk also
//! wins in memory, and an update whose caller stops waiting still finishes
//! both halves.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::CachedEntry;
use crate::{CodevError, Result};

/// Current on-disk format version.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// An immutable view of the whole index.
pub type IndexSnapshot = Arc<HashMap<String, CachedEntry>>;

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    entries: BTreeMap<String, CachedEntry>,
}

/// Durable location → [`CachedEntry`] map.
pub struct CacheIndex {
    path: PathBuf,
    root: PathBuf,
    current: Arc<RwLock<IndexSnapshot>>,
    writer: Arc<Mutex<()>>,
}

impl CacheIndex {
    /// Open the index stored at `path`.
    ///
    /// Cached files under `root` are persisted relative to it. A missing file
    /// yields an empty index; an unreadable or corrupt one is logged and
    /// treated as empty.
    pub fn open(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let root = root.into();
        let entries = load_entries(&path, &root).unwrap_or_default();
        debug!(path = %path.display(), entries = entries.len(), "opened cache index");
        Self {
            path,
            root,
            current: Arc::new(RwLock::new(Arc::new(entries))),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current full map.
    pub fn snapshot(&self) -> IndexSnapshot {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Look up a single entry in the current snapshot.
    pub fn get(&self, location: &str) -> Option<CachedEntry> {
        self.snapshot().get(location).cloned()
    }

    /// Persist `entries` as the new index, then publish it in memory.
    ///
    /// Concurrent updates are applied one at a time, so after any update
    /// returns the in-memory map equals the file. On error nothing in memory
    /// changes.
    pub async fn update(&self, entries: HashMap<String, CachedEntry>) -> Result<()> {
        let path = self.path.clone();
        let document = to_document(&entries, &self.root);
        let current = Arc::clone(&self.current);
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let _writing = writer.lock().unwrap_or_else(PoisonError::into_inner);
            write_document(&path, &document)?;
            *current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(entries);
            Ok(())
        })
        .await
        .map_err(|e| CodevError::IndexPersist {
            path: self.path.clone(),
            message: e.to_string(),
        })?
    }

    /// Install `base + (location → entry)`.
    ///
    /// `base` is the snapshot the caller made its decision on, not necessarily
    /// the latest one.
    pub async fn insert(
        &self,
        base: &IndexSnapshot,
        location: impl Into<String>,
        entry: CachedEntry,
    ) -> Result<()> {
        let mut entries = HashMap::clone(base);
        entries.insert(location.into(), entry);
        self.update(entries).await
    }
}

fn to_document(entries: &HashMap<String, CachedEntry>, root: &Path) -> IndexFile {
    let entries = entries
        .iter()
        .map(|(location, entry)| {
            let mut stored = entry.clone();
            if let Ok(relative) = entry.cached_file.strip_prefix(root) {
                stored.cached_file = relative.to_path_buf();
            }
            (location.clone(), stored)
        })
        .collect();
    IndexFile {
        version: INDEX_FORMAT_VERSION,
        entries,
    }
}

fn write_document(path: &Path, document: &IndexFile) -> Result<()> {
    let persist_err = |message: String| CodevError::IndexPersist {
        path: path.to_path_buf(),
        message,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .map_err(|e| persist_err(format!("failed to create {}: {e}", parent.display())))?;

    let json = serde_json::to_vec_pretty(document).map_err(|e| persist_err(e.to_string()))?;

    // Unique tmp name: concurrent updates must not interleave writes.
    let mut tmp = tempfile::Builder::new()
        .prefix(".resource-at-url")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| persist_err(format!("failed to create tmp file: {e}")))?;
    tmp.write_all(&json)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| persist_err(format!("failed to write tmp file: {e}")))?;
    tmp.persist(path)
        .map_err(|e| persist_err(format!("failed to replace index: {}", e.error)))?;
    Ok(())
}

fn load_entries(path: &Path, root: &Path) -> Option<HashMap<String, CachedEntry>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read cache index");
            return None;
        }
    };
    let document: IndexFile = match serde_json::from_str(&content) {
        Ok(document) => document,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt cache index");
            return None;
        }
    };
    if document.version > INDEX_FORMAT_VERSION {
        warn!(
            path = %path.display(),
            version = document.version,
            "unsupported cache index version (max supported: {INDEX_FORMAT_VERSION})"
        );
        return None;
    }
    Some(
        document
            .entries
            .into_iter()
            .map(|(location, mut entry)| {
                if entry.cached_file.is_relative() {
                    entry.cached_file = root.join(&entry.cached_file);
                }
                (location, entry)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceMetadata;
    use chrono::{TimeDelta, Utc};

    fn entry(root: &Path, name: &str) -> CachedEntry {
        CachedEntry::new(
            root.join("files").join(name),
            Utc::now(),
            Some(ResourceMetadata::new().with_content_length(42)),
        )
    }

    #[tokio::test]
    async fn update_persists_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let index = CacheIndex::open(dir.path().join("index.json"), dir.path());

        let e = entry(dir.path(), "a.jar");
        index
            .insert(&index.snapshot(), "https://example.com/a.jar", e.clone())
            .await
            .unwrap();

        assert_eq!(index.get("https://example.com/a.jar"), Some(e.clone()));

        let reopened = CacheIndex::open(dir.path().join("index.json"), dir.path());
        assert_eq!(reopened.get("https://example.com/a.jar"), Some(e));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_inserts_leave_memory_equal_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = Arc::new(CacheIndex::open(&path, dir.path()));

        for round in 0..20 {
            let base = index.snapshot();
            let writers: Vec<_> = (0..8)
                .map(|i| {
                    let index = Arc::clone(&index);
                    let base = Arc::clone(&base);
                    let e = entry(dir.path(), &format!("r{round}-k{i}.jar"));
                    tokio::spawn(async move { index.insert(&base, format!("r{round}-k{i}"), e).await })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap().unwrap();
            }

            let mut in_memory: Vec<_> = index.snapshot().keys().cloned().collect();
            let mut on_disk: Vec<_> = CacheIndex::open(&path, dir.path())
                .snapshot()
                .keys()
                .cloned()
                .collect();
            in_memory.sort();
            on_disk.sort();
            assert_eq!(in_memory, on_disk, "round {round}");
            // Last write wins from a shared base: exactly one of this round's keys.
            assert_eq!(in_memory.len(), base.len() + 1, "round {round}");
        }
    }

    #[tokio::test]
    async fn paths_under_root_are_stored_relative() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = CacheIndex::open(&path, dir.path());
        let outside = CachedEntry::new("/elsewhere/b.jar", Utc::now(), None);

        let mut entries = HashMap::new();
        entries.insert("a".to_string(), entry(dir.path(), "a.jar"));
        entries.insert("b".to_string(), outside);
        index.update(entries).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(
            raw["entries"]["a"]["cached_file"],
            Path::new("files").join("a.jar").to_str().unwrap()
        );
        assert_eq!(raw["entries"]["b"]["cached_file"], "/elsewhere/b.jar");
    }

    #[tokio::test]
    async fn relocated_cache_resolves_against_new_root() {
        let old = tempfile::tempdir().unwrap();
        let index = CacheIndex::open(old.path().join("index.json"), old.path());
        index
            .insert(&index.snapshot(), "a", entry(old.path(), "a.jar"))
            .await
            .unwrap();

        let new = tempfile::tempdir().unwrap();
        std::fs::copy(old.path().join("index.json"), new.path().join("index.json")).unwrap();
        let moved = CacheIndex::open(new.path().join("index.json"), new.path());
        assert_eq!(
            moved.get("a").unwrap().cached_file,
            new.path().join("files").join("a.jar")
        );
    }

    #[tokio::test]
    async fn update_from_stale_snapshot_drops_concurrent_change() {
        let dir = tempfile::tempdir().unwrap();
        let index = CacheIndex::open(dir.path().join("index.json"), dir.path());

        let observed = index.snapshot();
        index
            .insert(&index.snapshot(), "first", entry(dir.path(), "1.jar"))
            .await
            .unwrap();
        index
            .insert(&observed, "second", entry(dir.path(), "2.jar"))
            .await
            .unwrap();

        let snapshot = index.snapshot();
        assert!(snapshot.contains_key("second"));
        assert!(!snapshot.contains_key("first"));
    }

    #[tokio::test]
    async fn failed_persist_keeps_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // The index path's parent is a regular file, so nothing can be written.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let index = CacheIndex::open(blocker.join("index.json"), dir.path());

        let result = index
            .insert(&index.snapshot(), "a", entry(dir.path(), "a.jar"))
            .await;
        assert!(matches!(result, Err(CodevError::IndexPersist { .. })));
        assert!(index.snapshot().is_empty());
    }

    #[test]
    fn corrupt_file_yields_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(CacheIndex::open(&path, dir.path()).snapshot().is_empty());
    }

    #[test]
    fn future_version_yields_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, r#"{"version": 99, "entries": {}}"#).unwrap();
        assert!(CacheIndex::open(&path, dir.path()).snapshot().is_empty());
    }

    #[test]
    fn timestamps_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let cached_at = Utc::now() - TimeDelta::days(3);
        let mut entries = BTreeMap::new();
        entries.insert(
            "a".to_string(),
            CachedEntry::new(dir.path().join("a.jar"), cached_at, None),
        );
        let document = IndexFile {
            version: INDEX_FORMAT_VERSION,
            entries,
        };
        write_document(&path, &document).unwrap();

        let index = CacheIndex::open(&path, dir.path());
        assert_eq!(index.get("a").unwrap().cached_at, cached_at);
    }
}
