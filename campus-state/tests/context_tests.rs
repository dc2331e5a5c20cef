use async_trait::async_trait;
use campus_cache::{CacheStore, FetchError, FetchResult};
use campus_state::{Domain, DomainFetcher, UnifiedStateContext};
use campus_sync::{OnlineWatch, SyncCoordinator, SyncQueue};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fetcher that counts calls and pops scripted outcomes, falling back to
/// a fixed success value.
struct ScriptedFetcher {
    calls: AtomicUsize,
    script: Mutex<VecDeque<FetchResult>>,
    fallback: serde_json::Value,
}

impl ScriptedFetcher {
    fn ok(value: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            fallback: value,
        })
    }

    fn scripted(script: Vec<FetchResult>, fallback: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(script.into()),
            fallback,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomainFetcher for ScriptedFetcher {
    async fn fetch(&self) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

fn context_with(domains: Vec<Domain>) -> UnifiedStateContext {
    let cache = Arc::new(CacheStore::new());
    let watch = OnlineWatch::new(true);
    let coordinator = Arc::new(SyncCoordinator::new(
        SyncQueue::new(),
        Arc::clone(&cache),
        watch.subscribe(),
    ));
    UnifiedStateContext::new(cache, coordinator, domains)
}

// ── refresh lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn refresh_all_initializes_every_domain() {
    let user = ScriptedFetcher::ok(json!({"name": "sam"}));
    let dashboard = ScriptedFetcher::ok(json!({"unread": 3}));
    let ctx = context_with(vec![
        Domain::new("user", 60_000, user.clone()),
        Domain::new("dashboard", 60_000, dashboard.clone()),
    ]);

    assert!(!ctx.is_fully_initialized());
    ctx.refresh_all().await;

    assert!(ctx.is_fully_initialized());
    assert!(!ctx.has_any_errors());
    assert!(!ctx.is_loading());
    assert_eq!(user.calls(), 1);
    assert_eq!(dashboard.calls(), 1);
    assert_eq!(ctx.domain_value("user"), Some(json!({"name": "sam"})));
    assert_eq!(ctx.domain_value("dashboard"), Some(json!({"unread": 3})));

    let state = ctx.domain_state("user").unwrap();
    assert!(state.initialized);
    assert!(state.error.is_none());
    assert!(state.last_fetched_at.is_some());
}

#[tokio::test]
async fn fresh_cache_hit_skips_the_network() {
    let user = ScriptedFetcher::ok(json!({"name": "sam"}));
    let ctx = context_with(vec![Domain::new("user", 60_000, user.clone())]);

    ctx.refresh_all().await;
    ctx.refresh_all().await;

    assert_eq!(user.calls(), 1);
    assert!(ctx.is_fully_initialized());
}

#[tokio::test]
async fn concurrent_refreshes_of_one_domain_share_a_fetch() {
    let user = ScriptedFetcher::ok(json!({"name": "sam"}));
    let ctx = context_with(vec![Domain::new("user", 60_000, user.clone())]);

    tokio::join!(ctx.refresh_domain("user"), ctx.refresh_domain("user"));

    assert_eq!(user.calls(), 1);
    assert_eq!(ctx.domain_value("user"), Some(json!({"name": "sam"})));
}

#[tokio::test]
async fn refreshing_an_unregistered_domain_is_a_noop() {
    let ctx = context_with(vec![]);
    ctx.refresh_domain("ghost").await;
    assert!(ctx.domain_state("ghost").is_none());
    assert!(ctx.domain_value("ghost").is_none());
}

// ── error isolation ──────────────────────────────────────────────

#[tokio::test]
async fn one_failing_domain_does_not_block_the_others() {
    let user = ScriptedFetcher::ok(json!({"name": "sam"}));
    let insights = ScriptedFetcher::scripted(
        vec![Err(FetchError::Transient("insights api down".into()))],
        json!(null),
    );
    let ctx = context_with(vec![
        Domain::new("user", 60_000, user.clone()),
        Domain::new("insights", 60_000, insights.clone()),
    ]);

    ctx.refresh_all().await;

    // The failure is isolated to its own domain.
    let user_state = ctx.domain_state("user").unwrap();
    assert!(user_state.initialized);
    assert!(user_state.error.is_none());

    let insights_state = ctx.domain_state("insights").unwrap();
    assert!(!insights_state.initialized);
    assert!(insights_state.error.as_deref().unwrap().contains("insights api down"));

    assert!(!ctx.is_fully_initialized());
    assert!(ctx.has_any_errors());

    // The next refresh retries and recovers.
    ctx.refresh_all().await;
    assert!(ctx.is_fully_initialized());
    assert!(!ctx.has_any_errors());
}

#[tokio::test]
async fn failed_refresh_keeps_previous_data_readable() {
    let user = ScriptedFetcher::scripted(
        vec![
            Ok(json!({"name": "sam"})),
            Err(FetchError::Transient("timeout".into())),
        ],
        json!(null),
    );
    let ctx = context_with(vec![Domain::new("user", 60_000, user.clone())]);

    ctx.refresh_all().await;
    assert_eq!(ctx.domain_value("user"), Some(json!({"name": "sam"})));

    // Force the next refresh past the cache, then fail it.
    ctx.invalidate_cache("test");
    ctx.refresh_all().await;

    let state = ctx.domain_state("user").unwrap();
    assert!(state.error.is_some());
    // Stale data is preferred over a blank UI.
    assert!(ctx.domain_value("user").is_none());
    assert_eq!(ctx.domain_value_stale("user"), Some(json!({"name": "sam"})));
}

// ── invalidation ─────────────────────────────────────────────────

#[tokio::test]
async fn invalidate_cache_forces_refetch_everywhere() {
    let user = ScriptedFetcher::ok(json!({"name": "sam"}));
    let dashboard = ScriptedFetcher::ok(json!({"unread": 3}));
    let ctx = context_with(vec![
        Domain::new("user", 60_000, user.clone()),
        Domain::new("dashboard", 60_000, dashboard.clone()),
    ]);

    ctx.refresh_all().await;
    assert!(ctx.is_fully_initialized());

    ctx.invalidate_cache("logout");
    assert!(!ctx.is_fully_initialized());
    assert!(ctx.domain_value("user").is_none());

    ctx.refresh_all().await;
    assert!(ctx.is_fully_initialized());
    assert_eq!(user.calls(), 2);
    assert_eq!(dashboard.calls(), 2);
}

// ── snapshot ─────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_reflects_per_domain_state() {
    let user = ScriptedFetcher::ok(json!({"name": "sam"}));
    let insights = ScriptedFetcher::scripted(
        vec![Err(FetchError::Validation("bad shape".into()))],
        json!(null),
    );
    let ctx = context_with(vec![
        Domain::new("user", 60_000, user),
        Domain::new("insights", 60_000, insights),
    ]);

    ctx.refresh_all().await;
    let snapshot = ctx.snapshot();

    assert_eq!(snapshot.domains.len(), 2);
    assert!(snapshot.domains["user"].initialized);
    assert!(snapshot.domains["insights"].error.is_some());
    assert!(!snapshot.is_fully_initialized);
    assert!(snapshot.has_any_errors);
    assert!(!snapshot.is_loading);
}

// ── lifecycle ────────────────────────────────────────────────────

#[tokio::test]
async fn init_hydrates_persisted_cache_so_no_network_is_needed() {
    use campus_storage::{MemoryStorage, StorageAdapter};

    let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryStorage::new());

    // A previous session cached the user domain.
    {
        let cache = CacheStore::with_storage(Arc::clone(&storage), "cache:");
        cache.write("domain:user", json!({"name": "sam"}), 60_000);
    }

    // New session over the same storage.
    let cache = Arc::new(CacheStore::with_storage(storage, "cache:"));
    let watch = OnlineWatch::new(true);
    let coordinator = Arc::new(SyncCoordinator::new(
        SyncQueue::new(),
        Arc::clone(&cache),
        watch.subscribe(),
    ));
    let user = ScriptedFetcher::ok(json!({"name": "other"}));
    let ctx = UnifiedStateContext::new(
        cache,
        coordinator,
        vec![Domain::new("user", 60_000, user.clone())],
    );

    ctx.init();
    ctx.refresh_all().await;

    assert_eq!(user.calls(), 0);
    assert_eq!(ctx.domain_value("user"), Some(json!({"name": "sam"})));
    assert!(ctx.is_fully_initialized());

    ctx.shutdown().await;
}
