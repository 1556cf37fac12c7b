use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use super::sha1_file;
use crate::types::Sha1Hash;
use crate::{CodevError, Result};

/// Default maximum number of memoized file digests.
const DEFAULT_CHECKSUM_CACHE_MAX: u64 = 10_000;

/// A file already on disk that claims to have a given SHA-1.
///
/// The claim is not trusted: the engine recomputes the digest of its own copy
/// before promoting the file into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCandidate {
    pub file: PathBuf,
    pub sha1: Sha1Hash,
}

/// Caller-supplied set of files that may be reused instead of downloading.
#[async_trait]
pub trait LocalCandidates: Send + Sync {
    /// Whether the set is known to be empty.
    fn is_none(&self) -> bool;

    /// A candidate whose content has the given SHA-1, if any.
    async fn find_by_checksum(&self, sha1: &Sha1Hash) -> Option<LocalCandidate>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

/// Memoized file digests.
///
/// Entries are keyed on path and validated against the file's size and
/// modification time, so an edited file is rehashed. Uses a bounded moka
/// cache; clones share the same storage.
#[derive(Clone)]
pub struct ChecksumCache {
    entries: Cache<PathBuf, (FileStamp, Sha1Hash)>,
}

impl ChecksumCache {
    /// Create an empty cache with the default max capacity (10,000).
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_CHECKSUM_CACHE_MAX)
    }

    /// Create a cache with a custom max capacity.
    pub fn with_max_entries(max: u64) -> Self {
        Self {
            entries: Cache::new(max),
        }
    }

    /// SHA-1 of `path`, computed at most once per (size, mtime) of the file.
    pub async fn sha1(&self, path: &Path) -> Result<Sha1Hash> {
        let stamp = stamp(path).await?;
        if let Some((cached_stamp, hash)) = self.entries.get(path).await {
            if cached_stamp == stamp {
                return Ok(hash);
            }
        }
        let hash = sha1_file(path).await?;
        self.entries.insert(path.to_path_buf(), (stamp, hash)).await;
        Ok(hash)
    }

    /// Number of memoized digests.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ChecksumCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn stamp(path: &Path) -> Result<FileStamp> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| CodevError::io(path, e))?;
    Ok(FileStamp {
        len: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

/// [`LocalCandidates`] over an explicit list of files.
///
/// Files are hashed lazily on first query through a [`ChecksumCache`];
/// unreadable files are skipped.
///
/// ```rust
/// # use codev_fetch::FileCandidates;
/// let candidates = FileCandidates::new(vec!["/home/me/.m2/repository/client.jar".into()]);
/// ```
#[derive(Clone)]
pub struct FileCandidates {
    files: Vec<PathBuf>,
    checksums: ChecksumCache,
}

impl FileCandidates {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            checksums: ChecksumCache::new(),
        }
    }

    /// Share digests with other candidate sets (and across requests).
    pub fn with_checksum_cache(mut self, checksums: ChecksumCache) -> Self {
        self.checksums = checksums;
        self
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

#[async_trait]
impl LocalCandidates for FileCandidates {
    fn is_none(&self) -> bool {
        self.files.is_empty()
    }

    async fn find_by_checksum(&self, sha1: &Sha1Hash) -> Option<LocalCandidate> {
        for file in &self.files {
            match self.checksums.sha1(file).await {
                Ok(hash) if hash == *sha1 => {
                    return Some(LocalCandidate {
                        file: file.clone(),
                        sha1: hash,
                    });
                }
                Ok(_) => {}
                Err(e) => debug!(path = %file.display(), error = %e, "skipping unreadable candidate"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::sha1_bytes;

    #[tokio::test]
    async fn finds_matching_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jar");
        let b = dir.path().join("b.jar");
        std::fs::write(&a, b"alpha").unwrap();
        std::fs::write(&b, b"bravo").unwrap();

        let candidates = FileCandidates::new(vec![a, b.clone()]);
        let found = candidates.find_by_checksum(&sha1_bytes(b"bravo")).await.unwrap();
        assert_eq!(found.file, b);
        assert_eq!(found.sha1, sha1_bytes(b"bravo"));
    }

    #[tokio::test]
    async fn no_match_and_missing_files_yield_none() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jar");
        std::fs::write(&a, b"alpha").unwrap();

        let candidates = FileCandidates::new(vec![dir.path().join("gone.jar"), a]);
        assert!(candidates.find_by_checksum(&sha1_bytes(b"zulu")).await.is_none());
    }

    #[test]
    fn empty_list_is_none() {
        assert!(FileCandidates::new(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn cache_rehashes_modified_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jar");
        std::fs::write(&path, b"one").unwrap();

        let cache = ChecksumCache::new();
        assert_eq!(cache.sha1(&path).await.unwrap(), sha1_bytes(b"one"));

        // Different length guarantees a different stamp even on coarse mtimes.
        std::fs::write(&path, b"three").unwrap();
        assert_eq!(cache.sha1(&path).await.unwrap(), sha1_bytes(b"three"));
    }
}
