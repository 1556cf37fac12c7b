//! codev-fetch - Cache-aware fetching of remote build artifacts
//!
//! This crate downloads artifacts (dependency jars, version manifests, …)
//! from a remote origin into a local cache and keeps them current without
//! re-downloading on every use. For each request the engine picks the
//! cheapest way to a complete local file: serve the cached copy, revalidate
//! it through remote metadata, promote an existing local file with the same
//! SHA-1, or download. Concurrent requests for one location are collapsed
//! into a single fetch.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use codev_fetch::{
//!     CacheAwareResourceAccessor, FetchConfig, FileCandidates, ResourceLocation,
//!     ResourceRequest, refresh,
//! };
//!
//! #[tokio::main]
//! async fn main() -> codev_fetch::Result<()> {
//!     let accessor = CacheAwareResourceAccessor::from_config(
//!         FetchConfig::default().max_age(Duration::from_secs(6 * 3600)),
//!     )?;
//!
//!     let location = ResourceLocation::parse("https://libraries.example.com/client.jar")?;
//!     let candidates = FileCandidates::new(vec!["/home/me/.m2/repository/client.jar".into()])
//!         .with_checksum_cache(accessor.checksum_cache().clone());
//!
//!     let request = ResourceRequest::new(location)
//!         .candidates(Arc::new(candidates))
//!         .refresh_predicate(refresh::never());
//!
//!     if let Some(resource) = accessor.get_resource(request).await? {
//!         println!("{}", resource.file().display());
//!     }
//!     Ok(())
//! }
//! ```

pub mod accessor;
pub mod cache;
pub mod checksum;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod policy;
pub mod remote;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use accessor::{AccessorBuilder, CacheAwareResourceAccessor, ResourceRequest};
pub use cache::{CacheIndex, CachedEntry};
pub use checksum::{ChecksumCache, FileCandidates, LocalCandidate, LocalCandidates, sha1_file};
pub use clock::{ManualClock, SystemClock, TimeProvider};
pub use config::FetchConfig;
pub use error::{CodevError, Result};
pub use guard::ProducerGuard;
pub use policy::{CachePolicy, StalenessPredicate, refresh};
pub use remote::{ExternalResourceRepository, HttpRepository, RemoteContent};

// Re-export all types
pub use types::{LocallyAvailableResource, ResourceLocation, ResourceMetadata, Sha1Hash};
