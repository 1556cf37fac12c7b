//! Fetch engine configuration.
//!
//! [`FetchConfig`] is built in code with builder methods. With the `cli`
//! feature it can also be loaded from TOML, with the following resolution
//! order:
//! 1. `--config <path>` (explicit path, must exist)
//! 2. `~/.codev/config.toml` (user)
//! 3. built-in defaults
//!
//! ```toml
//! cache_dir = "/var/cache/codev"
//! max_age_secs = 3600
//! refresh_all = false
//! user_agent = "my-build/1.0"
//! http_timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checksum::sha1_bytes;
use crate::policy::{CachePolicy, DEFAULT_MAX_AGE};
use crate::types::ResourceLocation;

/// Environment variable overriding the default cache directory.
pub const CACHE_DIR_ENV: &str = "CODEV_CACHE_DIR";

const INDEX_FILE_NAME: &str = "resource-at-url.json";
const TEMP_DIR_NAME: &str = "tmp";
const FILES_DIR_NAME: &str = "files";

/// File name used when a location has no usable last path segment.
const FALLBACK_FILE_NAME: &str = "resource";

/// Configuration of a [`CacheAwareResourceAccessor`](crate::CacheAwareResourceAccessor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Root of the cache store. Holds the index, the temp dir and the files.
    pub cache_dir: PathBuf,
    /// Maximum entry age before revalidation (default: 24 hours).
    pub max_age: Option<Duration>,
    /// Revalidate every entry on every request (default: false).
    pub refresh_all: bool,
    /// User agent sent to HTTP origins.
    pub user_agent: String,
    /// Overall timeout of each HTTP request (default: none).
    pub http_timeout: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            max_age: Some(DEFAULT_MAX_AGE),
            refresh_all: false,
            user_agent: default_user_agent(),
            http_timeout: None,
        }
    }
}

/// `$CODEV_CACHE_DIR`, else `<platform cache dir>/codev`, else `./.codev-cache`.
pub fn default_cache_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .map(|dir| dir.join("codev"))
        .unwrap_or_else(|| PathBuf::from(".codev-cache"))
}

fn default_user_agent() -> String {
    format!("codev-fetch/{}", env!("CARGO_PKG_VERSION"))
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `dir` as the cache root.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the maximum entry age before revalidation.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Disable age-based revalidation.
    pub fn no_max_age(mut self) -> Self {
        self.max_age = None;
        self
    }

    pub fn refresh_all(mut self, enabled: bool) -> Self {
        self.refresh_all = enabled;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Path of the persistent index file.
    pub fn index_path(&self) -> PathBuf {
        self.cache_dir.join(INDEX_FILE_NAME)
    }

    /// Directory for in-progress downloads and candidate copies.
    pub fn temp_dir(&self) -> PathBuf {
        self.cache_dir.join(TEMP_DIR_NAME)
    }

    /// Directory holding published files.
    pub fn files_dir(&self) -> PathBuf {
        self.cache_dir.join(FILES_DIR_NAME)
    }

    /// Default destination of `location`: `files/<sha1 of location>/<file name>`.
    ///
    /// The hashed directory keeps distinct locations with the same file name
    /// apart.
    pub fn destination_for(&self, location: &ResourceLocation) -> PathBuf {
        let file_name = location
            .file_name()
            .filter(|name| is_safe_file_name(name))
            .unwrap_or(FALLBACK_FILE_NAME);
        self.files_dir()
            .join(sha1_bytes(location.as_str().as_bytes()).to_string())
            .join(file_name)
    }

    /// The global staleness policy described by this config.
    pub fn cache_policy(&self) -> CachePolicy {
        let policy = CachePolicy::new().refresh_all(self.refresh_all);
        match self.max_age {
            Some(max_age) => policy.max_age(max_age),
            None => policy.no_max_age(),
        }
    }
}

fn is_safe_file_name(name: &str) -> bool {
    name != "." && name != ".." && !name.contains(['/', '\\']) && Path::new(name).file_name().is_some()
}

#[cfg(feature = "cli")]
mod file {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use serde::Deserialize;

    use super::FetchConfig;
    use crate::{CodevError, Result};

    /// On-disk form of [`FetchConfig`]. Every key is optional.
    #[derive(Debug, Default, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ConfigFile {
        #[serde(default)]
        cache_dir: Option<PathBuf>,
        /// `0` disables age-based revalidation.
        #[serde(default)]
        max_age_secs: Option<u64>,
        #[serde(default)]
        refresh_all: Option<bool>,
        #[serde(default)]
        user_agent: Option<String>,
        #[serde(default)]
        http_timeout_secs: Option<u64>,
    }

    impl FetchConfig {
        /// Load configuration from the standard locations.
        ///
        /// Resolution order:
        /// 1. Explicit path (if provided)
        /// 2. `~/.codev/config.toml`
        /// 3. Defaults
        pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
            let Some(path) = Self::resolve_config_path(explicit_path)? else {
                return Ok(Self::default());
            };
            let content = fs::read_to_string(&path).map_err(|e| {
                CodevError::Configuration(format!("Failed to read config file {path:?}: {e}"))
            })?;
            Self::from_toml_str(&content).map_err(|e| match e {
                CodevError::Configuration(msg) => {
                    CodevError::Configuration(format!("{msg} (in {path:?})"))
                }
                other => other,
            })
        }

        /// Parse a TOML document on top of the defaults.
        pub fn from_toml_str(content: &str) -> Result<Self> {
            let file: ConfigFile = toml::from_str(content).map_err(|e| {
                CodevError::Configuration(format!("Failed to parse config: {e}"))
            })?;

            let mut config = Self::default();
            if let Some(dir) = file.cache_dir {
                config.cache_dir = dir;
            }
            match file.max_age_secs {
                Some(0) => config.max_age = None,
                Some(secs) => config.max_age = Some(Duration::from_secs(secs)),
                None => {}
            }
            if let Some(refresh_all) = file.refresh_all {
                config.refresh_all = refresh_all;
            }
            if let Some(user_agent) = file.user_agent {
                config.user_agent = user_agent;
            }
            if let Some(secs) = file.http_timeout_secs {
                config.http_timeout = Some(Duration::from_secs(secs));
            }
            Ok(config)
        }

        /// Resolve the config file path; `None` means "use defaults".
        fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
            if let Some(path) = explicit {
                if path.exists() {
                    return Ok(Some(path.to_path_buf()));
                }
                return Err(CodevError::Configuration(format!(
                    "Config file not found: {path:?}"
                )));
            }

            // User config
            if let Some(home) = dirs::home_dir() {
                let user_config = home.join(".codev").join("config.toml");
                if user_config.exists() {
                    return Ok(Some(user_config));
                }
            }

            Ok(None)
        }
    }
}
