//! Codev fetch error types

use std::path::{Path, PathBuf};

/// Codev fetch error types
///
/// Every variant carries owned, cloneable data so that a single failed fetch
/// can be handed to every caller waiting on the same location.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodevError {
    // Remote/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("remote returned HTTP {status} for {location}")]
    Api { status: u16, location: String },

    // Local storage errors
    #[error("I/O error on {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    /// The cache index could not be written. The in-memory index is left as
    /// it was before the failed update.
    #[error("failed to persist cache index {}: {message}", .path.display())]
    IndexPersist { path: PathBuf, message: String },

    // Data errors
    #[error("JSON error: {0}")]
    Json(String),

    #[error("invalid resource location: {0}")]
    InvalidLocation(String),

    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The task running a fetch panicked or was cancelled by runtime
    /// shutdown before producing a result.
    #[error("fetch task failed: {0}")]
    TaskFailed(String),
}

impl CodevError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        CodevError::Io {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Only transport failures and server-side (5xx) responses qualify;
    /// local disk and data errors are permanent for the request.
    pub fn is_transient(&self) -> bool {
        match self {
            CodevError::Http(_) => true,
            CodevError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CodevError {
    fn from(err: serde_json::Error) -> Self {
        CodevError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for CodevError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => CodevError::Api {
                status: status.as_u16(),
                location: err.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => CodevError::Http(err.to_string()),
        }
    }
}

impl From<url::ParseError> for CodevError {
    fn from(err: url::ParseError) -> Self {
        CodevError::InvalidLocation(err.to_string())
    }
}

/// Result type alias for codev fetch operations
pub type Result<T> = std::result::Result<T, CodevError>;
