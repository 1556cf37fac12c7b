//! Telemetry metric name constants.
//!
//! Centralised metric names for fetch operations. Consumers install their own
//! `metrics` recorder (e.g. prometheus, statsd); without a recorder installed,
//! all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `codev_fetch_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `outcome`: how a request was satisfied: "hit", "revalidated", "local",
//!   "downloaded", "unavailable" or "error"

/// Total `get_resource` requests, once per executed decision procedure.
///
/// Labels: `outcome`.
pub const REQUESTS_TOTAL: &str = "codev_fetch_requests_total";

/// Total bytes streamed from the remote origin into temporary files.
pub const BYTES_DOWNLOADED_TOTAL: &str = "codev_fetch_bytes_downloaded_total";

/// Total callers that joined a fetch already in flight for the same location.
pub const COALESCED_TOTAL: &str = "codev_fetch_coalesced_total";

/// Total local candidates rejected because their recomputed checksum differed.
pub const CANDIDATE_MISMATCHES_TOTAL: &str = "codev_fetch_candidate_mismatches_total";

/// Outcome label values for [`REQUESTS_TOTAL`].
pub mod outcome {
    pub const HIT: &str = "hit";
    pub const REVALIDATED: &str = "revalidated";
    pub const LOCAL: &str = "local";
    pub const DOWNLOADED: &str = "downloaded";
    pub const UNAVAILABLE: &str = "unavailable";
    pub const ERROR: &str = "error";
}
