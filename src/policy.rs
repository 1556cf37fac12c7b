//! Staleness policy: when must a cached entry be revalidated?
//!
//! Two independent signals are combined:
//!
//! - a caller-supplied [`StalenessPredicate`] over the cached file and its
//!   age, for domain heuristics (e.g. "snapshot jars older than a day");
//! - the global [`CachePolicy`], a maximum age plus a "refresh everything"
//!   override.
//!
//! Either signal alone forces revalidation. An entry is served without
//! contacting the origin only when both agree it is fresh.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::CachedEntry;

/// Caller heuristic deciding whether a cached file of a given age is stale.
pub type StalenessPredicate = Arc<dyn Fn(&Path, Duration) -> bool + Send + Sync>;

/// Ready-made [`StalenessPredicate`]s.
pub mod refresh {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use super::StalenessPredicate;

    /// Never asks for revalidation; leaves the decision to the global policy.
    pub fn never() -> StalenessPredicate {
        Arc::new(|_: &Path, _: Duration| false)
    }

    /// Always asks for revalidation.
    pub fn always() -> StalenessPredicate {
        Arc::new(|_: &Path, _: Duration| true)
    }

    /// Asks for revalidation once the entry is strictly older than `max_age`.
    pub fn older_than(max_age: Duration) -> StalenessPredicate {
        Arc::new(move |_: &Path, age: Duration| age > max_age)
    }
}

/// Default global maximum age for cached entries (24 hours).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// Global revalidation rules applied to every cached entry.
///
/// ```rust
/// # use codev_fetch::CachePolicy;
/// # use std::time::Duration;
/// let policy = CachePolicy::new().max_age(Duration::from_secs(3600));
/// assert!(policy.must_refresh(Duration::from_secs(7200)));
/// assert!(!policy.must_refresh(Duration::from_secs(60)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// Entries strictly older than this are revalidated. `None` disables the
    /// age check. Default: 24 hours.
    pub max_age: Option<Duration>,
    /// Revalidate every entry regardless of age. Default: false.
    pub refresh_all: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_age: Some(DEFAULT_MAX_AGE),
            refresh_all: false,
        }
    }
}

impl CachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum age before revalidation.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Never revalidate because of age alone.
    pub fn no_max_age(mut self) -> Self {
        self.max_age = None;
        self
    }

    /// Force revalidation of every entry.
    pub fn refresh_all(mut self, enabled: bool) -> Self {
        self.refresh_all = enabled;
        self
    }

    /// Global signal: must an entry of this age be revalidated?
    pub fn must_refresh(&self, age: Duration) -> bool {
        self.refresh_all || self.max_age.is_some_and(|max| age > max)
    }

    /// Combined decision for a cached entry at time `now`.
    pub fn needs_revalidation(
        &self,
        entry: &CachedEntry,
        now: DateTime<Utc>,
        predicate: &(dyn Fn(&Path, Duration) -> bool + Send + Sync),
    ) -> bool {
        let age = entry.age_at(now);
        predicate(&entry.cached_file, age) || self.must_refresh(age)
    }
}
