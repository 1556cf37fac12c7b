//! Staging and publishing of cached files.
//!
//! Bytes never land at their final path directly. A download is streamed into
//! a temporary file under the cache's temp directory; publishing copies that
//! file next to the target and renames it into place, so readers only ever
//! see a complete file. Temporary files are removed when their [`TempPath`]
//! is dropped, whatever the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{CacheIndex, CachedEntry, IndexSnapshot};
use crate::clock::TimeProvider;
use crate::remote::ExternalResourceRepository;
use crate::telemetry;
use crate::types::{LocallyAvailableResource, ResourceLocation, ResourceMetadata};
use crate::{CodevError, Result};

/// A completed download, staged in a temporary file.
#[derive(Debug)]
pub struct Download {
    pub temp: TempPath,
    pub metadata: ResourceMetadata,
    pub bytes: u64,
}

/// Writes files into the cache store and records them in the index.
pub struct CachePublisher {
    index: Arc<CacheIndex>,
    temp_dir: PathBuf,
    clock: Arc<dyn TimeProvider>,
}

impl CachePublisher {
    pub fn new(index: Arc<CacheIndex>, temp_dir: impl Into<PathBuf>, clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            index,
            temp_dir: temp_dir.into(),
            clock,
        }
    }

    pub fn index(&self) -> &Arc<CacheIndex> {
        &self.index
    }

    /// A fresh, empty temporary file in the temp directory.
    async fn temp_file(&self) -> Result<(tokio::fs::File, TempPath)> {
        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| CodevError::io(&self.temp_dir, e))?;
        let named = tempfile::Builder::new()
            .prefix("codev_download")
            .suffix(".bin")
            .tempfile_in(&self.temp_dir)
            .map_err(|e| CodevError::io(&self.temp_dir, e))?;
        let (file, path) = named.into_parts();
        Ok((tokio::fs::File::from_std(file), path))
    }

    /// Stream the content of `location` into a temporary file.
    ///
    /// Returns `None` if the origin reports the resource missing.
    pub async fn download(
        &self,
        repository: &dyn ExternalResourceRepository,
        location: &ResourceLocation,
    ) -> Result<Option<Download>> {
        let Some(mut content) = repository.fetch(location).await? else {
            return Ok(None);
        };

        let (mut file, temp) = self.temp_file().await?;
        let mut bytes = 0u64;
        while let Some(chunk) = content.body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| CodevError::io(&temp, e))?;
            bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| CodevError::io(&temp, e))?;
        file.sync_all().await.map_err(|e| CodevError::io(&temp, e))?;

        metrics::counter!(telemetry::BYTES_DOWNLOADED_TOTAL).increment(bytes);
        info!(%location, bytes, repository = repository.name(), "downloaded resource");
        Ok(Some(Download {
            temp,
            metadata: content.metadata,
            bytes,
        }))
    }

    /// Copy a local file into a temporary file the engine owns.
    ///
    /// The caller's file may change underneath us; the copy cannot.
    pub async fn copy_candidate(&self, candidate: &Path) -> Result<TempPath> {
        let (file, temp) = self.temp_file().await?;
        drop(file);
        tokio::fs::copy(candidate, &temp)
            .await
            .map_err(|e| CodevError::io(candidate, e))?;
        Ok(temp)
    }

    /// Publish `source` at `target` and record it in the index.
    ///
    /// The bytes are staged next to `target` and renamed over it, replacing
    /// any previous file atomically. The index update starts from `base`.
    pub async fn publish(
        &self,
        base: &IndexSnapshot,
        location: &ResourceLocation,
        source: &Path,
        target: &Path,
        metadata: Option<ResourceMetadata>,
    ) -> Result<LocallyAvailableResource> {
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CodevError::io(parent, e))?;

        let staged = tempfile::Builder::new()
            .prefix(".codev")
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(|e| CodevError::io(parent, e))?
            .into_temp_path();
        tokio::fs::copy(source, &staged)
            .await
            .map_err(|e| CodevError::io(source, e))?;
        staged
            .persist(target)
            .map_err(|e| CodevError::io(target, e.error))?;
        debug!(%location, path = %target.display(), "published cached file");

        let entry = CachedEntry::new(target, self.clock.now(), metadata);
        let resource = entry.to_resource(location);
        self.index.insert(base, location.as_str(), entry).await?;
        Ok(resource)
    }

    /// Mark an existing entry as revalidated now, without touching its file.
    pub async fn refresh(
        &self,
        base: &IndexSnapshot,
        location: &ResourceLocation,
        entry: &CachedEntry,
    ) -> Result<LocallyAvailableResource> {
        let refreshed = entry.refreshed(self.clock.now());
        let resource = refreshed.to_resource(location);
        self.index.insert(base, location.as_str(), refreshed).await?;
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::remote::RemoteContent;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, Utc};

    struct Fixed(Option<&'static [u8]>);

    #[async_trait]
    impl ExternalResourceRepository for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn metadata(&self, _: &ResourceLocation) -> Result<Option<ResourceMetadata>> {
            Ok(self.0.map(|body| ResourceMetadata::new().with_content_length(body.len() as u64)))
        }

        async fn fetch(&self, _: &ResourceLocation) -> Result<Option<RemoteContent>> {
            Ok(self.0.map(|body| {
                RemoteContent::from_bytes(
                    ResourceMetadata::new().with_content_length(body.len() as u64),
                    body,
                )
            }))
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000)
    }

    fn publisher(root: &Path, clock: Arc<ManualClock>) -> CachePublisher {
        let index = Arc::new(CacheIndex::open(root.join("index.json"), root));
        CachePublisher::new(index, root.join("tmp"), clock)
    }

    fn location() -> ResourceLocation {
        ResourceLocation::parse("https://repo.example.com/a.jar").unwrap()
    }

    #[tokio::test]
    async fn download_stages_body_in_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = publisher(dir.path(), Arc::new(ManualClock::new(t0())));

        let download = publisher
            .download(&Fixed(Some(b"jar bytes")), &location())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(download.bytes, 9);
        assert_eq!(download.metadata.content_length, Some(9));
        assert!(download.temp.starts_with(dir.path().join("tmp")));
        assert_eq!(std::fs::read(&download.temp).unwrap(), b"jar bytes");

        let staged = download.temp.to_path_buf();
        drop(download);
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn download_of_missing_resource_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = publisher(dir.path(), Arc::new(ManualClock::new(t0())));
        assert!(publisher.download(&Fixed(None), &location()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn publish_replaces_target_and_records_entry() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let publisher = publisher(dir.path(), clock.clone());
        let target = dir.path().join("files").join("a.jar");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, b"old").unwrap();

        let source = dir.path().join("source.jar");
        std::fs::write(&source, b"new").unwrap();
        let metadata = ResourceMetadata::new().with_etag("\"2\"");
        let base = publisher.index().snapshot();
        let resource = publisher
            .publish(&base, &location(), &source, &target, Some(metadata.clone()))
            .await
            .unwrap();

        assert_eq!(resource.file(), target);
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        let entry = publisher.index().get(location().as_str()).unwrap();
        assert_eq!(entry.cached_file, target);
        assert_eq!(entry.cached_at, t0());
        assert_eq!(entry.metadata, Some(metadata));
        // No staging leftovers beside the target.
        assert_eq!(std::fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn refresh_only_moves_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let publisher = publisher(dir.path(), clock.clone());
        let entry = CachedEntry::new(dir.path().join("a.jar"), t0(), None);

        clock.advance(std::time::Duration::from_secs(90));
        let base = publisher.index().snapshot();
        let resource = publisher.refresh(&base, &location(), &entry).await.unwrap();

        assert_eq!(resource.file(), entry.cached_file);
        let stored = publisher.index().get(location().as_str()).unwrap();
        assert_eq!(stored.cached_file, entry.cached_file);
        assert_eq!(stored.cached_at, t0() + TimeDelta::seconds(90));
    }

    #[tokio::test]
    async fn copy_candidate_is_independent_of_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = publisher(dir.path(), Arc::new(ManualClock::new(t0())));
        let source = dir.path().join("candidate.jar");
        std::fs::write(&source, b"v1").unwrap();

        let copy = publisher.copy_candidate(&source).await.unwrap();
        std::fs::write(&source, b"v2").unwrap();
        assert_eq!(std::fs::read(&copy).unwrap(), b"v1");
    }
}
