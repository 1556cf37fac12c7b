use tracing::debug;

use crate::remote::ExternalResourceRepository;
use crate::types::{ResourceLocation, ResourceMetadata, Sha1Hash};
use crate::{CodevError, Result};

/// Suffix of the checksum sidecar published next to an artifact.
const SIDECAR_SUFFIX: &str = ".sha1";

/// Upper bound on a sidecar body. Real sidecars are 40 hex digits plus an
/// optional file name; anything much larger is an error page.
const SIDECAR_MAX_BYTES: usize = 4096;

/// Determine the SHA-1 of the resource at `location`.
///
/// Sources, in order: the caller's `hint`, the `sha1` attribute of the
/// freshly fetched `remote` metadata, then the `<location>.sha1` sidecar.
/// Failures while reading the sidecar are logged and yield `None`; the caller
/// then falls back to a full download.
pub async fn resolve_checksum(
    repository: &dyn ExternalResourceRepository,
    location: &ResourceLocation,
    hint: Option<Sha1Hash>,
    remote: &ResourceMetadata,
) -> Option<Sha1Hash> {
    if let Some(hash) = hint {
        return Some(hash);
    }
    if let Some(hash) = remote.sha1 {
        return Some(hash);
    }
    match fetch_sidecar(repository, location).await {
        Ok(found) => found,
        Err(e) => {
            debug!(%location, error = %e, "checksum sidecar unavailable");
            None
        }
    }
}

async fn fetch_sidecar(
    repository: &dyn ExternalResourceRepository,
    location: &ResourceLocation,
) -> Result<Option<Sha1Hash>> {
    let sidecar = location.append(SIDECAR_SUFFIX);
    let Some(content) = repository.fetch(&sidecar).await? else {
        debug!(%sidecar, "no checksum sidecar");
        return Ok(None);
    };
    let body = content.into_bytes(SIDECAR_MAX_BYTES).await?;
    let text = std::str::from_utf8(&body)
        .map_err(|e| CodevError::InvalidChecksum(format!("{sidecar}: {e}")))?;
    parse_sidecar(text).map(Some)
}

/// Parse the body of a `.sha1` sidecar.
///
/// The digest is the first whitespace-separated token (`sha1sum` output
/// appends the file name). Leading zeros may have been stripped.
pub fn parse_sidecar(text: &str) -> Result<Sha1Hash> {
    let token = text
        .split_whitespace()
        .next()
        .ok_or_else(|| CodevError::InvalidChecksum("empty checksum file".to_string()))?;
    Sha1Hash::from_stripped_hex(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteContent;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const DIGEST: &str = "0a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d";

    /// Serves fixed bodies and records which locations were fetched.
    #[derive(Default)]
    struct Bodies {
        files: HashMap<String, &'static str>,
        fetched: Mutex<Vec<String>>,
    }

    impl Bodies {
        fn with(mut self, location: &str, body: &'static str) -> Self {
            self.files.insert(location.to_string(), body);
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExternalResourceRepository for Bodies {
        fn name(&self) -> &str {
            "bodies"
        }

        async fn metadata(&self, _: &ResourceLocation) -> Result<Option<ResourceMetadata>> {
            Ok(None)
        }

        async fn fetch(&self, location: &ResourceLocation) -> Result<Option<RemoteContent>> {
            self.fetched.lock().unwrap().push(location.to_string());
            Ok(self
                .files
                .get(location.as_str())
                .map(|body| RemoteContent::from_bytes(ResourceMetadata::default(), *body)))
        }
    }

    fn jar() -> ResourceLocation {
        ResourceLocation::parse("https://repo.example.com/lib/client.jar").unwrap()
    }

    #[tokio::test]
    async fn hint_wins_without_network() {
        let repo = Bodies::default();
        let hint: Sha1Hash = DIGEST.parse().unwrap();
        let remote = ResourceMetadata::new().with_sha1("ffffffffffffffffffffffffffffffffffffffff".parse().unwrap());

        let resolved = resolve_checksum(&repo, &jar(), Some(hint), &remote).await;
        assert_eq!(resolved, Some(hint));
        assert!(repo.fetched().is_empty());
    }

    #[tokio::test]
    async fn metadata_checksum_used_before_sidecar() {
        let repo = Bodies::default();
        let hash: Sha1Hash = DIGEST.parse().unwrap();
        let remote = ResourceMetadata::new().with_sha1(hash);

        assert_eq!(resolve_checksum(&repo, &jar(), None, &remote).await, Some(hash));
        assert!(repo.fetched().is_empty());
    }

    #[tokio::test]
    async fn sidecar_is_fetched_last() {
        let repo = Bodies::default().with(
            "https://repo.example.com/lib/client.jar.sha1",
            "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d  client.jar\n",
        );

        let resolved = resolve_checksum(&repo, &jar(), None, &ResourceMetadata::default()).await;
        assert_eq!(resolved, Some(DIGEST.parse().unwrap()));
        assert_eq!(repo.fetched(), vec!["https://repo.example.com/lib/client.jar.sha1"]);
    }

    #[tokio::test]
    async fn missing_or_garbage_sidecar_yields_none() {
        let missing = Bodies::default();
        assert_eq!(
            resolve_checksum(&missing, &jar(), None, &ResourceMetadata::default()).await,
            None
        );

        let garbage = Bodies::default().with(
            "https://repo.example.com/lib/client.jar.sha1",
            "<html>not found</html>",
        );
        assert_eq!(
            resolve_checksum(&garbage, &jar(), None, &ResourceMetadata::default()).await,
            None
        );
    }

    #[test]
    fn parse_sidecar_forms() {
        let expected: Sha1Hash = DIGEST.parse().unwrap();
        assert_eq!(parse_sidecar(DIGEST).unwrap(), expected);
        assert_eq!(parse_sidecar(&format!("{DIGEST} *client.jar")).unwrap(), expected);
        assert_eq!(parse_sidecar(&DIGEST[1..]).unwrap(), expected);
        assert!(parse_sidecar("   \n").is_err());
    }
}
