//! Data domains.
//!
//! A domain is an independently loaded slice of application data with
//! its own fetch function and freshness budget. Domain payloads are
//! opaque JSON; their shape belongs to the REST collaborator.

use async_trait::async_trait;
use campus_cache::FetchResult;
use campus_types::UnixMillis;
use serde::Serialize;
use std::sync::Arc;

/// Fetches one domain's payload from the backend.
///
/// Backed by an authenticated REST call (bearer token handled by the
/// auth collaborator); the coordinator only sees the resulting JSON.
#[async_trait]
pub trait DomainFetcher: Send + Sync {
    /// Performs the fetch.
    async fn fetch(&self) -> FetchResult;
}

/// A registered domain: name, freshness budget, fetch function.
#[derive(Clone)]
pub struct Domain {
    pub name: String,
    pub ttl_ms: u64,
    pub fetcher: Arc<dyn DomainFetcher>,
}

impl Domain {
    /// Creates a domain registration.
    #[must_use]
    pub fn new(name: impl Into<String>, ttl_ms: u64, fetcher: Arc<dyn DomainFetcher>) -> Self {
        Self {
            name: name.into(),
            ttl_ms,
            fetcher,
        }
    }
}

/// Per-domain fetch lifecycle flags.
///
/// Mutated only by that domain's fetch lifecycle; never shared across
/// domains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DomainState {
    /// A fetch is currently in flight.
    pub loading: bool,
    /// At least one fetch has succeeded (or a fresh cached value was
    /// found) since the last global invalidation.
    pub initialized: bool,
    /// The last fetch failure, if the most recent attempt failed.
    pub error: Option<String>,
    /// When the last successful network fetch landed.
    pub last_fetched_at: Option<UnixMillis>,
}
