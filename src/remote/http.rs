//! HTTP(S) origin backed by `reqwest`.
//!
//! Metadata comes from a `HEAD` request, content from a `GET`. `404` and
//! `410` mean the resource does not exist; any other non-success status is
//! an [`Api`](crate::CodevError::Api) error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderMap, LAST_MODIFIED};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use super::{ExternalResourceRepository, RemoteContent};
use crate::config::FetchConfig;
use crate::types::{ResourceLocation, ResourceMetadata, Sha1Hash};
use crate::{CodevError, Result};

/// Checksum header published by Artifactory, Nexus and similar repositories.
const CHECKSUM_SHA1_HEADER: &str = "x-checksum-sha1";

/// Repository that fetches resources over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpRepository {
    client: Client,
}

impl HttpRepository {
    /// Build a client from the user agent and timeout in `config`.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CodevError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Use an existing client (shared connection pool, custom TLS, …).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// `Ok(None)` for "not there", the response for success, an error otherwise.
    fn check_status(location: &ResourceLocation, response: Response) -> Result<Option<Response>> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            debug!(%location, %status, "remote resource missing");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CodevError::Api {
                status: status.as_u16(),
                location: location.to_string(),
            });
        }
        Ok(Some(response))
    }
}

#[async_trait]
impl ExternalResourceRepository for HttpRepository {
    fn name(&self) -> &str {
        "http"
    }

    async fn metadata(&self, location: &ResourceLocation) -> Result<Option<ResourceMetadata>> {
        let response = self.client.head(location.url().clone()).send().await?;
        Ok(Self::check_status(location, response)?.map(|r| metadata_from_headers(r.headers())))
    }

    async fn fetch(&self, location: &ResourceLocation) -> Result<Option<RemoteContent>> {
        let response = self.client.get(location.url().clone()).send().await?;
        let Some(response) = Self::check_status(location, response)? else {
            return Ok(None);
        };
        let metadata = metadata_from_headers(response.headers());
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(CodevError::from))
            .boxed();
        Ok(Some(RemoteContent::new(metadata, body)))
    }
}

/// Extract change-detection attributes from response headers.
///
/// Malformed values are ignored rather than rejected: a missing attribute
/// only makes revalidation less conclusive.
pub(crate) fn metadata_from_headers(headers: &HeaderMap) -> ResourceMetadata {
    let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);

    ResourceMetadata {
        last_modified: text(LAST_MODIFIED.as_str()).and_then(parse_http_date),
        // Read the header directly: a HEAD response has no body to size.
        content_length: text(CONTENT_LENGTH.as_str()).and_then(|v| v.parse().ok()),
        etag: text(ETAG.as_str()).filter(|v| !v.is_empty()).map(str::to_owned),
        sha1: text(CHECKSUM_SHA1_HEADER).and_then(|v| v.parse::<Sha1Hash>().ok()),
        content_type: text(CONTENT_TYPE.as_str()).map(str::to_owned),
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn parses_standard_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LAST_MODIFIED,
            HeaderValue::from_static("Tue, 15 Nov 1994 08:12:31 GMT"),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1024"));
        headers.insert(ETAG, HeaderValue::from_static("\"xyzzy\""));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/java-archive"));
        headers.insert(
            CHECKSUM_SHA1_HEADER,
            HeaderValue::from_static("da39a3ee5e6b4b0d3255bfef95601890afd80709"),
        );

        let metadata = metadata_from_headers(&headers);
        assert_eq!(
            metadata.last_modified.unwrap().to_rfc3339(),
            "1994-11-15T08:12:31+00:00"
        );
        assert_eq!(metadata.content_length, Some(1024));
        assert_eq!(metadata.etag.as_deref(), Some("\"xyzzy\""));
        assert_eq!(metadata.content_type.as_deref(), Some("application/java-archive"));
        assert_eq!(
            metadata.sha1.unwrap().to_string(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn malformed_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(LAST_MODIFIED, HeaderValue::from_static("yesterday"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        headers.insert(CHECKSUM_SHA1_HEADER, HeaderValue::from_static("nope"));

        assert_eq!(metadata_from_headers(&headers), ResourceMetadata::default());
    }
}
