//! Remote origin access.
//!
//! The engine talks to the origin only through [`ExternalResourceRepository`]:
//! "give me the metadata" and "give me the bytes". [`HttpRepository`] is the
//! default implementation; tests and embedders can supply their own.
//!
//! # Absence is not an error
//!
//! Both operations return `Ok(None)` when the resource does not exist at the
//! origin. Errors are reserved for failures to find out (transport errors,
//! unexpected status codes).

mod compare;
mod http;

pub use compare::is_definitely_unchanged;
pub use http::HttpRepository;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};

use crate::Result;
use crate::types::{ResourceLocation, ResourceMetadata};

/// Stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Body and metadata of a fetched resource.
pub struct RemoteContent {
    pub metadata: ResourceMetadata,
    pub body: ByteStream,
}

impl RemoteContent {
    pub fn new(metadata: ResourceMetadata, body: ByteStream) -> Self {
        Self { metadata, body }
    }

    /// Content backed by an in-memory buffer.
    pub fn from_bytes(metadata: ResourceMetadata, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::new(metadata, stream::once(async move { Ok(bytes) }).boxed())
    }

    /// Collect the body, failing if it exceeds `limit` bytes.
    pub async fn into_bytes(mut self, limit: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.body.next().await {
            let chunk = chunk?;
            if buf.len() + chunk.len() > limit {
                return Err(crate::CodevError::Http(format!(
                    "response body exceeds {limit} bytes"
                )));
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }
}

/// Remote origin capability consumed by the fetch engine.
#[async_trait]
pub trait ExternalResourceRepository: Send + Sync {
    /// Repository name for logging/debugging.
    fn name(&self) -> &str;

    /// Fetch only the metadata of a resource.
    ///
    /// Returns `None` if the resource does not exist.
    async fn metadata(&self, location: &ResourceLocation) -> Result<Option<ResourceMetadata>>;

    /// Fetch the content and metadata of a resource.
    ///
    /// Returns `None` if the resource does not exist.
    async fn fetch(&self, location: &ResourceLocation) -> Result<Option<RemoteContent>>;
}
