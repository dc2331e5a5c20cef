//! The unified state context.
//!
//! Constructed once at application start and passed by reference to
//! consumers — there is no ambient global instance. `init` hydrates
//! persisted state and starts the sync loop; `shutdown` stops it.

use crate::domain::{Domain, DomainFetcher, DomainState};
use campus_cache::{CacheStore, RequestDeduplicator};
use campus_sync::SyncCoordinator;
use campus_types::UnixMillis;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

struct DomainEntry {
    ttl_ms: u64,
    fetcher: Arc<dyn DomainFetcher>,
    state: RwLock<DomainState>,
}

/// Read-only aggregate view handed to UI consumers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StateSnapshot {
    /// Per-domain lifecycle flags, keyed by domain name.
    pub domains: HashMap<String, DomainState>,
    /// Every domain has initialized at least once.
    pub is_fully_initialized: bool,
    /// At least one domain's last fetch failed.
    pub has_any_errors: bool,
    /// At least one domain has a fetch in flight.
    pub is_loading: bool,
}

/// Façade aggregating all registered data domains.
pub struct UnifiedStateContext {
    cache: Arc<CacheStore>,
    dedup: RequestDeduplicator,
    coordinator: Arc<SyncCoordinator>,
    domains: HashMap<String, DomainEntry>,
}

impl UnifiedStateContext {
    /// Creates a context over a fixed set of domains.
    #[must_use]
    pub fn new(
        cache: Arc<CacheStore>,
        coordinator: Arc<SyncCoordinator>,
        domains: Vec<Domain>,
    ) -> Self {
        let domains = domains
            .into_iter()
            .map(|d| {
                let entry = DomainEntry {
                    ttl_ms: d.ttl_ms,
                    fetcher: d.fetcher,
                    state: RwLock::new(DomainState::default()),
                };
                (d.name, entry)
            })
            .collect();
        Self {
            cache,
            dedup: RequestDeduplicator::new(),
            coordinator,
            domains,
        }
    }

    /// Hydrates persisted cache and queue state, then starts the sync
    /// loop.
    pub fn init(&self) {
        self.cache.load();
        self.coordinator.load_queue();
        self.coordinator.start();
    }

    /// Stops the sync loop.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }

    /// The sync coordinator, for queueing mutations and status queries.
    #[must_use]
    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Refreshes every domain in parallel.
    ///
    /// No ordering between domains; each individual domain's fetches are
    /// serialized by its deduplication key.
    pub async fn refresh_all(&self) {
        let refreshes = self.domains.keys().map(|name| self.refresh_domain(name));
        futures::future::join_all(refreshes).await;
    }

    /// Runs one domain's fetch lifecycle.
    ///
    /// A fresh cache hit skips the network. On failure only this domain's
    /// error flag is set; previously loaded data stays readable via
    /// `domain_value_stale`, so the UI can show a couldn't-refresh
    /// indicator without losing content.
    pub async fn refresh_domain(&self, name: &str) {
        let Some(entry) = self.domains.get(name) else {
            warn!("refresh requested for unregistered domain {name}");
            return;
        };
        let key = Self::cache_key(name);

        if self.cache.read_with_max_age(&key, entry.ttl_ms).is_some() {
            debug!("domain {name} served from cache");
            let mut state = entry.state.write().expect("domain lock poisoned");
            state.loading = false;
            state.initialized = true;
            state.error = None;
            return;
        }

        {
            let mut state = entry.state.write().expect("domain lock poisoned");
            state.loading = true;
        }

        let fetcher = Arc::clone(&entry.fetcher);
        let result = self
            .dedup
            .get_or_fetch(&key, move || async move { fetcher.fetch().await })
            .await;

        let mut state = entry.state.write().expect("domain lock poisoned");
        state.loading = false;
        match result {
            Ok(value) => {
                self.cache.write(&key, value, entry.ttl_ms);
                state.initialized = true;
                state.error = None;
                state.last_fetched_at = Some(UnixMillis::now());
            }
            Err(e) => {
                warn!("domain {name} refresh failed: {e}");
                state.error = Some(e.to_string());
            }
        }
    }

    /// The domain's value, if a fresh one is cached.
    #[must_use]
    pub fn domain_value(&self, name: &str) -> Option<serde_json::Value> {
        let entry = self.domains.get(name)?;
        self.cache
            .read_with_max_age(&Self::cache_key(name), entry.ttl_ms)
    }

    /// The domain's last known value regardless of freshness.
    #[must_use]
    pub fn domain_value_stale(&self, name: &str) -> Option<serde_json::Value> {
        self.domains.get(name)?;
        self.cache.read_stale(&Self::cache_key(name))
    }

    /// This domain's lifecycle flags.
    #[must_use]
    pub fn domain_state(&self, name: &str) -> Option<DomainState> {
        self.domains
            .get(name)
            .map(|e| e.state.read().expect("domain lock poisoned").clone())
    }

    /// True iff every domain has initialized.
    #[must_use]
    pub fn is_fully_initialized(&self) -> bool {
        self.domains
            .values()
            .all(|e| e.state.read().expect("domain lock poisoned").initialized)
    }

    /// True iff any domain's last fetch failed.
    #[must_use]
    pub fn has_any_errors(&self) -> bool {
        self.domains
            .values()
            .any(|e| e.state.read().expect("domain lock poisoned").error.is_some())
    }

    /// True iff any domain has a fetch in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.domains
            .values()
            .any(|e| e.state.read().expect("domain lock poisoned").loading)
    }

    /// Read-only aggregate snapshot for consumers.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        let domains: HashMap<String, DomainState> = self
            .domains
            .iter()
            .map(|(name, e)| {
                (
                    name.clone(),
                    e.state.read().expect("domain lock poisoned").clone(),
                )
            })
            .collect();
        StateSnapshot {
            is_fully_initialized: domains.values().all(|s| s.initialized),
            has_any_errors: domains.values().any(|s| s.error.is_some()),
            is_loading: domains.values().any(|s| s.loading),
            domains,
        }
    }

    /// Lazily invalidates the whole cache and marks every domain
    /// uninitialized, forcing the next refresh to refetch.
    pub fn invalidate_cache(&self, reason: &str) {
        self.cache.invalidate(reason);
        for entry in self.domains.values() {
            let mut state = entry.state.write().expect("domain lock poisoned");
            state.initialized = false;
        }
        debug!("unified state invalidated: {reason}");
    }

    fn cache_key(name: &str) -> String {
        format!("domain:{name}")
    }
}
