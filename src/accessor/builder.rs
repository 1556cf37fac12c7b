//! Builder for configuring accessor instances

use std::sync::Arc;

use super::{CacheAwareResourceAccessor, Inner};
use crate::Result;
use crate::cache::{CacheIndex, CachePublisher};
use crate::checksum::ChecksumCache;
use crate::clock::{SystemClock, TimeProvider};
use crate::config::FetchConfig;
use crate::guard::ProducerGuard;
use crate::remote::{ExternalResourceRepository, HttpRepository};

/// Builder for [`CacheAwareResourceAccessor`].
///
/// Anything not set explicitly is derived from the [`FetchConfig`]: an
/// [`HttpRepository`] for the origin and the system clock for timestamps.
pub struct AccessorBuilder {
    config: FetchConfig,
    repository: Option<Arc<dyn ExternalResourceRepository>>,
    clock: Option<Arc<dyn TimeProvider>>,
    checksums: Option<ChecksumCache>,
}

impl AccessorBuilder {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            repository: None,
            clock: None,
            checksums: None,
        }
    }

    /// Use a custom origin instead of HTTP.
    pub fn repository(mut self, repository: Arc<dyn ExternalResourceRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Use a custom time source (tests inject a [`ManualClock`](crate::ManualClock)).
    pub fn clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share file digests with other components.
    pub fn checksum_cache(mut self, checksums: ChecksumCache) -> Self {
        self.checksums = Some(checksums);
        self
    }

    /// Open the index and assemble the accessor.
    ///
    /// # Errors
    ///
    /// Returns an error if the default HTTP client cannot be built.
    pub fn build(self) -> Result<CacheAwareResourceAccessor> {
        let repository: Arc<dyn ExternalResourceRepository> = match self.repository {
            Some(repository) => repository,
            None => Arc::new(HttpRepository::new(&self.config)?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let index = Arc::new(CacheIndex::open(
            self.config.index_path(),
            &self.config.cache_dir,
        ));
        let publisher = CachePublisher::new(index, self.config.temp_dir(), Arc::clone(&clock));

        Ok(CacheAwareResourceAccessor {
            inner: Arc::new(Inner {
                policy: self.config.cache_policy(),
                config: self.config,
                repository,
                publisher,
                clock,
                checksums: self.checksums.unwrap_or_default(),
                guard: ProducerGuard::new(),
            }),
        })
    }
}
