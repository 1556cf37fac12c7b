//! Resource locations (normalized remote URIs).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Result;

/// Stable identifier of a remote artifact.
///
/// Parsing normalizes the URI (scheme and host case, dot segments, default
/// ports), so two spellings of the same address compare equal. The string
/// form is used verbatim as the cache index key.
///
/// ```rust
/// # use codev_fetch::ResourceLocation;
/// let location = ResourceLocation::parse("HTTPS://Example.com/a/../lib.jar").unwrap();
/// assert_eq!(location.as_str(), "https://example.com/lib.jar");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceLocation(Url);

impl ResourceLocation {
    /// Parse and normalize a location.
    pub fn parse(input: &str) -> Result<Self> {
        Ok(Self(Url::parse(input)?))
    }

    /// The normalized string form, used as the cache key.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The underlying URL.
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// A location whose path has `suffix` appended, keeping any query string.
    ///
    /// Used to derive sidecar locations such as `lib.jar.sha1`.
    pub fn append(&self, suffix: &str) -> Self {
        let mut url = self.0.clone();
        let path = format!("{}{suffix}", url.path());
        url.set_path(&path);
        Self(url)
    }

    /// Last non-empty path segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
    }
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceLocation {
    type Err = crate::CodevError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Url> for ResourceLocation {
    fn from(url: Url) -> Self {
        Self(url)
    }
}
