use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{LocallyAvailableResource, ResourceLocation, ResourceMetadata};

/// Index record of a previously fetched resource.
///
/// Entries are never modified in place; a refresh produces a new entry that
/// replaces the old one in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub cached_file: PathBuf,
    pub cached_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResourceMetadata>,
}

impl CachedEntry {
    pub fn new(
        cached_file: impl Into<PathBuf>,
        cached_at: DateTime<Utc>,
        metadata: Option<ResourceMetadata>,
    ) -> Self {
        Self {
            cached_file: cached_file.into(),
            cached_at,
            metadata,
        }
    }

    /// Time elapsed since the entry was cached. Never negative.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.cached_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Same file and metadata, cached at `now`.
    pub fn refreshed(&self, now: DateTime<Utc>) -> Self {
        Self {
            cached_at: now,
            ..self.clone()
        }
    }

    pub fn to_resource(&self, source: &ResourceLocation) -> LocallyAvailableResource {
        LocallyAvailableResource::new(
            self.cached_file.clone(),
            source.clone(),
            self.metadata.clone(),
        )
    }
}
