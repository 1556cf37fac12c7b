//! Cache-aware resource access.
//!
//! [`CacheAwareResourceAccessor::get_resource`] decides, for one location,
//! how to produce a complete local file:
//!
//! 1. No cache entry and no local candidates: download straight into the
//!    cache.
//! 2. Cache entry considered fresh: serve it, no network.
//! 3. Stale entry: fetch remote metadata. Resource gone means unavailable.
//!    Provably unchanged means the entry's timestamp is refreshed and the
//!    cached file is served.
//! 4. Changed (or no entry) with candidates: resolve the remote SHA-1 and
//!    promote a local file with that content.
//! 5. Otherwise download.
//!
//! The whole procedure runs under a per-location [`ProducerGuard`], so
//! concurrent requests for one location share a single execution.

mod builder;
mod request;

pub use builder::AccessorBuilder;
pub use request::ResourceRequest;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{CacheIndex, CachePublisher, CachedEntry, IndexSnapshot};
use crate::checksum::{ChecksumCache, LocalCandidates, resolve_checksum, sha1_file};
use crate::clock::TimeProvider;
use crate::config::FetchConfig;
use crate::guard::ProducerGuard;
use crate::policy::CachePolicy;
use crate::remote::{ExternalResourceRepository, is_definitely_unchanged};
use crate::telemetry::{self, outcome};
use crate::types::{LocallyAvailableResource, ResourceLocation, ResourceMetadata};
use crate::Result;

type Outcome = Result<Option<LocallyAvailableResource>>;

/// The fetch engine. Cheap to clone; clones share the index and the guard.
///
/// ```rust,no_run
/// use codev_fetch::{CacheAwareResourceAccessor, FetchConfig, ResourceLocation, ResourceRequest};
///
/// #[tokio::main]
/// async fn main() -> codev_fetch::Result<()> {
///     let accessor = CacheAwareResourceAccessor::from_config(FetchConfig::default())?;
///     let location = ResourceLocation::parse("https://libraries.example.com/client.jar")?;
///
///     match accessor.get_resource(ResourceRequest::new(location)).await? {
///         Some(resource) => println!("{}", resource.file().display()),
///         None => eprintln!("not available"),
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct CacheAwareResourceAccessor {
    inner: Arc<Inner>,
}

struct Inner {
    config: FetchConfig,
    policy: CachePolicy,
    repository: Arc<dyn ExternalResourceRepository>,
    publisher: CachePublisher,
    clock: Arc<dyn TimeProvider>,
    checksums: ChecksumCache,
    guard: ProducerGuard<Option<LocallyAvailableResource>>,
}

/// How a request was satisfied.
enum Resolution {
    Hit(LocallyAvailableResource),
    Revalidated(LocallyAvailableResource),
    Local(LocallyAvailableResource),
    Downloaded(LocallyAvailableResource),
    Unavailable,
}

impl Resolution {
    fn outcome(&self) -> &'static str {
        match self {
            Resolution::Hit(_) => outcome::HIT,
            Resolution::Revalidated(_) => outcome::REVALIDATED,
            Resolution::Local(_) => outcome::LOCAL,
            Resolution::Downloaded(_) => outcome::DOWNLOADED,
            Resolution::Unavailable => outcome::UNAVAILABLE,
        }
    }

    fn into_resource(self) -> Option<LocallyAvailableResource> {
        match self {
            Resolution::Hit(r)
            | Resolution::Revalidated(r)
            | Resolution::Local(r)
            | Resolution::Downloaded(r) => Some(r),
            Resolution::Unavailable => None,
        }
    }
}

impl CacheAwareResourceAccessor {
    /// Start configuring an accessor.
    pub fn builder(config: FetchConfig) -> AccessorBuilder {
        AccessorBuilder::new(config)
    }

    /// An accessor over HTTP with the system clock.
    pub fn from_config(config: FetchConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Make the resource at `request.location` available as a local file.
    ///
    /// Returns `Ok(None)` when the origin does not have the resource, even if
    /// an older copy is cached. Concurrent calls for the same location run
    /// the decision procedure once and all receive its result. The procedure
    /// runs as its own task: dropping this future does not cancel a fetch in
    /// progress, and the index is still updated when it completes.
    pub async fn get_resource(&self, request: ResourceRequest) -> Outcome {
        let inner = Arc::clone(&self.inner);
        let key = request.location.as_str().to_owned();
        self.inner
            .guard
            .guard_by_key(&key, move || async move { inner.resolve(request).await })
            .await
    }

    pub fn config(&self) -> &FetchConfig {
        &self.inner.config
    }

    pub fn index(&self) -> &Arc<CacheIndex> {
        self.inner.publisher.index()
    }

    /// Digest cache to share with [`FileCandidates`](crate::FileCandidates).
    pub fn checksum_cache(&self) -> &ChecksumCache {
        &self.inner.checksums
    }

    /// Default destination for `location` when a request names none.
    pub fn destination_for(&self, location: &ResourceLocation) -> PathBuf {
        self.inner.config.destination_for(location)
    }
}

impl Inner {
    async fn resolve(&self, request: ResourceRequest) -> Outcome {
        let result = self.decide(&request).await;
        let label = match &result {
            Ok(resolution) => resolution.outcome(),
            Err(e) => {
                warn!(location = %request.location, error = %e, "resource fetch failed");
                outcome::ERROR
            }
        };
        metrics::counter!(telemetry::REQUESTS_TOTAL, "outcome" => label).increment(1);
        result.map(Resolution::into_resource)
    }

    async fn decide(&self, request: &ResourceRequest) -> Result<Resolution> {
        let location = &request.location;
        debug!(%location, "resolving resource");

        // Every index update of this request starts from this snapshot.
        let base = self.publisher.index().snapshot();
        let cached = self.cached_entry(&base, location).await;
        let candidates = request.usable_candidates();
        let destination = request
            .destination
            .clone()
            .unwrap_or_else(|| self.config.destination_for(location));

        if cached.is_none() && candidates.is_none() {
            return self.download(&base, location, &destination).await;
        }

        if let Some(entry) = &cached {
            let now = self.clock.now();
            if !self
                .policy
                .needs_revalidation(entry, now, request.should_refresh.as_ref())
            {
                debug!(%location, path = %entry.cached_file.display(), "cache hit");
                return Ok(Resolution::Hit(entry.to_resource(location)));
            }
        }

        let Some(remote) = self.repository.metadata(location).await? else {
            info!(%location, "resource no longer available at origin");
            return Ok(Resolution::Unavailable);
        };

        if let Some(entry) = &cached {
            if is_definitely_unchanged(entry.metadata.as_ref(), &remote) {
                info!(%location, "cached resource is up-to-date");
                let resource = self.publisher.refresh(&base, location, entry).await?;
                return Ok(Resolution::Revalidated(resource));
            }
        }

        if let Some(candidates) = candidates {
            if let Some(resource) = self
                .promote_candidate(&base, request, candidates, &remote, &destination)
                .await?
            {
                return Ok(Resolution::Local(resource));
            }
        }

        self.download(&base, location, &destination).await
    }

    /// The entry for `location`, unless its file has gone missing.
    async fn cached_entry(&self, base: &IndexSnapshot, location: &ResourceLocation) -> Option<CachedEntry> {
        let entry = base.get(location.as_str())?;
        match tokio::fs::try_exists(&entry.cached_file).await {
            Ok(true) => Some(entry.clone()),
            _ => {
                warn!(%location, path = %entry.cached_file.display(), "cached file missing, ignoring entry");
                None
            }
        }
    }

    async fn promote_candidate(
        &self,
        base: &IndexSnapshot,
        request: &ResourceRequest,
        candidates: &dyn LocalCandidates,
        remote: &ResourceMetadata,
        destination: &Path,
    ) -> Result<Option<LocallyAvailableResource>> {
        let location = &request.location;
        let Some(expected) =
            resolve_checksum(self.repository.as_ref(), location, request.sha1, remote).await
        else {
            debug!(%location, "no remote checksum, skipping local candidates");
            return Ok(None);
        };
        let Some(candidate) = candidates.find_by_checksum(&expected).await else {
            debug!(%location, sha1 = %expected, "no local candidate matches");
            return Ok(None);
        };
        info!(%location, path = %candidate.file.display(), "found local candidate with matching checksum");

        let copy = self.publisher.copy_candidate(&candidate.file).await?;
        let actual = sha1_file(&copy).await?;
        if actual != expected {
            warn!(
                %location,
                path = %candidate.file.display(),
                expected = %expected,
                actual = %actual,
                "local candidate checksum mismatch"
            );
            metrics::counter!(telemetry::CANDIDATE_MISMATCHES_TOTAL).increment(1);
            return Ok(None);
        }

        let resource = self
            .publisher
            .publish(base, location, &copy, destination, Some(remote.clone()))
            .await?;
        Ok(Some(resource))
    }

    async fn download(
        &self,
        base: &IndexSnapshot,
        location: &ResourceLocation,
        destination: &Path,
    ) -> Result<Resolution> {
        let Some(download) = self
            .publisher
            .download(self.repository.as_ref(), location)
            .await?
        else {
            info!(%location, "resource not found at origin");
            return Ok(Resolution::Unavailable);
        };
        let resource = self
            .publisher
            .publish(base, location, &download.temp, destination, Some(download.metadata))
            .await?;
        Ok(Resolution::Downloaded(resource))
    }
}
