//! Request deduplication.
//!
//! Many independent UI consumers can ask for the same resource at the
//! same instant. The deduplicator keeps one shared future per key: the
//! first caller starts the fetch, later callers join it, and every
//! waiter sees the same resolution or the same rejection. Settlement
//! removes the registration, so a failure is never cached — the next
//! call starts fresh.

use crate::error::FetchResult;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::debug;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Coalesces concurrent fetches per cache key.
///
/// Guarantee: at most one concurrent invocation of the fetch function per
/// key, regardless of how many callers request it simultaneously.
pub struct RequestDeduplicator {
    in_flight: Arc<Mutex<HashMap<String, SharedFetch>>>,
}

impl RequestDeduplicator {
    /// Creates a deduplicator with no fetches in flight.
    #[must_use]
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the in-flight fetch for `key`, or starts one via `fetch`.
    ///
    /// `fetch` is only invoked when no fetch for `key` is currently in
    /// flight. All callers awaiting the same key receive the same
    /// outcome, success or failure.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self.in_flight.lock().expect("dedup lock poisoned");
            if let Some(existing) = in_flight.get(key) {
                debug!("joining in-flight fetch for {key}");
                existing.clone()
            } else {
                let registry = Arc::clone(&self.in_flight);
                let owned_key = key.to_string();
                let inner = fetch();
                let shared = async move {
                    let outcome = inner.await;
                    // Deregister on settlement, before any waiter observes
                    // the outcome, so the next call refetches.
                    registry
                        .lock()
                        .expect("dedup lock poisoned")
                        .remove(&owned_key);
                    outcome
                }
                .boxed()
                .shared();
                in_flight.insert(key.to_string(), shared.clone());
                shared
            }
        };

        shared.await
    }

    /// Number of fetches currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().expect("dedup lock poisoned").len()
    }
}

impl Default for RequestDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}
