use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::checksum::LocalCandidates;
use crate::policy::{StalenessPredicate, refresh};
use crate::types::{ResourceLocation, Sha1Hash};

/// Everything the engine needs to know about one `get_resource` call.
///
/// ```rust
/// # use codev_fetch::{ResourceLocation, ResourceRequest, refresh};
/// # use std::time::Duration;
/// let location = ResourceLocation::parse("https://libraries.example.com/client.jar").unwrap();
/// let request = ResourceRequest::new(location)
///     .destination("/tmp/codev/client.jar")
///     .refresh_predicate(refresh::older_than(Duration::from_secs(3600)));
/// ```
#[derive(Clone)]
pub struct ResourceRequest {
    pub(crate) location: ResourceLocation,
    pub(crate) destination: Option<PathBuf>,
    pub(crate) sha1: Option<Sha1Hash>,
    pub(crate) candidates: Option<Arc<dyn LocalCandidates>>,
    pub(crate) should_refresh: StalenessPredicate,
}

impl ResourceRequest {
    /// A request with no hint, no candidates, the default destination and a
    /// predicate that defers to the global policy.
    pub fn new(location: ResourceLocation) -> Self {
        Self {
            location,
            destination: None,
            sha1: None,
            candidates: None,
            should_refresh: refresh::never(),
        }
    }

    /// Where the published file should live. Defaults to a path derived from
    /// the location under the cache's `files` directory.
    pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    /// Known SHA-1 of the remote content, used before any remote lookup.
    pub fn sha1(mut self, sha1: Sha1Hash) -> Self {
        self.sha1 = Some(sha1);
        self
    }

    /// Local files that may already hold the content.
    pub fn candidates(mut self, candidates: Arc<dyn LocalCandidates>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Caller heuristic over (cached file, age); `true` forces revalidation.
    pub fn should_refresh<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Path, Duration) -> bool + Send + Sync + 'static,
    {
        self.should_refresh = Arc::new(predicate);
        self
    }

    /// Same as [`should_refresh`](Self::should_refresh) for a shared predicate.
    pub fn refresh_predicate(mut self, predicate: StalenessPredicate) -> Self {
        self.should_refresh = predicate;
        self
    }

    pub fn location(&self) -> &ResourceLocation {
        &self.location
    }

    /// Candidates worth querying: supplied and not known to be empty.
    pub(crate) fn usable_candidates(&self) -> Option<&dyn LocalCandidates> {
        self.candidates.as_deref().filter(|c| !c.is_none())
    }
}

impl fmt::Debug for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRequest")
            .field("location", &self.location)
            .field("destination", &self.destination)
            .field("sha1", &self.sha1)
            .field("candidates", &self.candidates.is_some())
            .finish_non_exhaustive()
    }
}
