use std::path::{Path, PathBuf};

use super::{ResourceLocation, ResourceMetadata};

/// A remote resource that is now available as a complete local file.
///
/// The file exists and is complete when handed out. The caller does not own
/// it: the file lives in the shared cache store and may be replaced by a later
/// fetch of the same location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocallyAvailableResource {
    file: PathBuf,
    source: ResourceLocation,
    metadata: Option<ResourceMetadata>,
}

impl LocallyAvailableResource {
    pub fn new(
        file: impl Into<PathBuf>,
        source: ResourceLocation,
        metadata: Option<ResourceMetadata>,
    ) -> Self {
        Self {
            file: file.into(),
            source,
            metadata,
        }
    }

    /// Path of the cached file.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Location the file was fetched from.
    pub fn source(&self) -> &ResourceLocation {
        &self.source
    }

    /// Remote metadata observed when the file was fetched, if any.
    pub fn metadata(&self) -> Option<&ResourceMetadata> {
        self.metadata.as_ref()
    }
}
