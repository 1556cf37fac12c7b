//! Per-key single-flight execution.
//!
//! [`ProducerGuard`] collapses concurrent operations on the same key into one:
//! the first caller starts the operation, later callers for the same key
//! attach to it and receive a clone of its output. Distinct keys never wait on
//! each other.
//!
//! The operation runs as its own task. Callers only wait on it, so a caller
//! that gives up (a timeout, a dropped request) leaves the operation running
//! to completion, and the callers still attached get its output.
//!
//! Nothing is remembered once an operation completes: the in-flight record is
//! removed by the task itself before its output is handed out, whether the
//! operation returned or panicked, so the next call for that key runs the
//! operation again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::{debug, warn};

use crate::telemetry;
use crate::{CodevError, Result};

type Flight<T> = Shared<BoxFuture<'static, Result<T>>>;
type Registry<T> = Arc<Mutex<HashMap<String, Flight<T>>>>;

/// Single-flight guard keyed by string.
pub struct ProducerGuard<T: Clone> {
    flights: Registry<T>,
}

/// Clears a key's in-flight record when the task running it ends, including
/// by panic or cancellation.
struct Slot<T: Clone> {
    registry: Registry<T>,
    key: String,
}

impl<T: Clone> Drop for Slot<T> {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.key);
    }
}

impl<T> ProducerGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `operation` for `key`, unless one is already running.
    ///
    /// If an operation for `key` is in flight, `operation` is dropped unused
    /// and this call resolves to the in-flight operation's output. An
    /// operation that panics resolves every attached caller to
    /// [`CodevError::TaskFailed`].
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn guard_by_key<F, Fut>(&self, key: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        // Outside the lock: this panics when there is no runtime.
        let runtime = tokio::runtime::Handle::current();
        let flight = {
            let mut flights = lock(&self.flights);
            match flights.get(key) {
                Some(existing) => {
                    debug!(key, "joining in-flight operation");
                    metrics::counter!(telemetry::COALESCED_TOTAL).increment(1);
                    existing.clone()
                }
                None => {
                    let slot = Slot {
                        registry: Arc::clone(&self.flights),
                        key: key.to_owned(),
                    };
                    let work = operation();
                    // The map stays locked until the flight is recorded, so the
                    // slot cannot be cleared before it is filled.
                    let task = runtime.spawn(async move {
                        let _slot = slot;
                        work.await
                    });
                    let owned_key = key.to_owned();
                    let flight = async move {
                        task.await.unwrap_or_else(|e| {
                            warn!(key = %owned_key, error = %e, "in-flight operation failed");
                            Err(CodevError::TaskFailed(e.to_string()))
                        })
                    }
                    .boxed()
                    .shared();
                    flights.insert(key.to_owned(), flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    /// Number of keys with an operation currently in flight.
    pub fn in_flight(&self) -> usize {
        lock(&self.flights).len()
    }
}

impl<T> Default for ProducerGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// Operations never run while the map is locked, so a poisoned lock still
// holds a consistent map.
fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
