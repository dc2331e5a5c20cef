//! The cache store.
//!
//! An entry is *fresh* iff it is younger than its TTL (and any stricter
//! caller-supplied max age) and its version stamp matches the store's
//! global version. `invalidate` bumps the global version instead of
//! deleting anything, which makes "everything is now stale" (logout, a
//! sync-driven change) an O(1) operation. Fine-grained eviction is still
//! available per key or per prefix when only one domain changed.

use campus_storage::StorageAdapter;
use campus_types::UnixMillis;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// A single cached value with its freshness metadata.
///
/// This is also the persisted record, verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cache key.
    pub key: String,
    /// The cached value, opaque to the store.
    pub value: serde_json::Value,
    /// When the value was written.
    pub stored_at: UnixMillis,
    /// Maximum age before the entry goes stale.
    pub ttl_ms: u64,
    /// Version stamp; must match the global version to be fresh.
    pub version: u64,
}

impl CacheEntry {
    fn is_fresh(&self, now: UnixMillis, max_age_ms: u64, global_version: u64) -> bool {
        let limit = self.ttl_ms.min(max_age_ms);
        self.stored_at.saturating_elapsed(now) < limit && self.version == global_version
    }
}

/// Observability snapshot of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries held (fresh or stale).
    pub entries: usize,
    /// Approximate total serialized size of the cached values.
    pub approx_bytes: usize,
    /// Current global version stamp.
    pub global_version: u64,
}

/// Reserved key suffix for the persisted global version stamp.
const VERSION_KEY: &str = "__version";

/// Key/value cache with per-entry TTLs and a global version stamp.
pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    global_version: AtomicU64,
    storage: Option<Arc<dyn StorageAdapter>>,
    namespace: String,
}

impl CacheStore {
    /// Creates a memory-only store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            global_version: AtomicU64::new(0),
            storage: None,
            namespace: String::new(),
        }
    }

    /// Creates a store that writes entries through to `storage` under the
    /// given namespace prefix (e.g. `"cache:"`).
    #[must_use]
    pub fn with_storage(storage: Arc<dyn StorageAdapter>, namespace: impl Into<String>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            global_version: AtomicU64::new(0),
            storage: Some(storage),
            namespace: namespace.into(),
        }
    }

    /// Hydrates the in-memory map from persisted entries.
    ///
    /// The global version is restored from its persisted record, taking
    /// the max against entry stamps so a reload neither spuriously
    /// invalidates what was fresh nor resurrects entries a pre-restart
    /// `invalidate` already retired. Unreadable records are skipped with
    /// a warning.
    pub fn load(&self) {
        let Some(storage) = &self.storage else {
            return;
        };

        let keys = match storage.keys(&self.namespace) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("cache load failed, starting cold: {e}");
                return;
            }
        };

        let version_key = self.storage_key(VERSION_KEY);
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let mut max_version = self.global_version.load(Ordering::SeqCst);
        let mut loaded = 0usize;

        match storage.get(&version_key) {
            Ok(Some(raw)) => match raw.parse::<u64>() {
                Ok(version) => max_version = max_version.max(version),
                Err(e) => warn!("cache load skipped malformed version record: {e}"),
            },
            Ok(None) => {}
            Err(e) => warn!("cache load could not read version record: {e}"),
        }

        for storage_key in keys {
            if storage_key == version_key {
                continue;
            }
            let raw = match storage.get(&storage_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!("cache load skipped {storage_key}: {e}");
                    continue;
                }
            };
            match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => {
                    max_version = max_version.max(entry.version);
                    entries.insert(entry.key.clone(), entry);
                    loaded += 1;
                }
                Err(e) => {
                    warn!("cache load skipped malformed record {storage_key}: {e}");
                }
            }
        }

        self.global_version.store(max_version, Ordering::SeqCst);
        debug!("cache hydrated: {loaded} entries, version {max_version}");
    }

    /// Stores `value` under `key`, stamped with the current global version.
    ///
    /// Never fails: a persistence error is logged and the entry stays
    /// memory-only.
    pub fn write(&self, key: &str, value: serde_json::Value, ttl_ms: u64) {
        self.store_entry(key, value, ttl_ms, None);
    }

    /// Stores `value` with an explicit version stamp.
    ///
    /// An explicit version always wins over the global counter. A read
    /// still requires the stamp to equal the global version, so writing a
    /// stale version simply produces an entry that is never fresh.
    pub fn write_versioned(&self, key: &str, value: serde_json::Value, ttl_ms: u64, ver: u64) {
        self.store_entry(key, value, ttl_ms, Some(ver));
    }

    fn store_entry(&self, key: &str, value: serde_json::Value, ttl_ms: u64, ver: Option<u64>) {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            stored_at: UnixMillis::now(),
            ttl_ms,
            version: ver.unwrap_or_else(|| self.global_version.load(Ordering::SeqCst)),
        };

        if let Some(storage) = &self.storage {
            match serde_json::to_string(&entry) {
                Ok(raw) => {
                    if let Err(e) = storage.set(&self.storage_key(key), &raw) {
                        warn!("cache persist failed for {key}, entry is memory-only: {e}");
                    }
                }
                Err(e) => {
                    warn!("cache entry {key} not serializable, entry is memory-only: {e}");
                }
            }
        }

        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(key.to_string(), entry);
    }

    /// Returns the value under `key` if it is fresh.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<serde_json::Value> {
        self.read_with_max_age(key, u64::MAX)
    }

    /// Returns the value under `key` if it is younger than both its own
    /// TTL and `max_age_ms`.
    ///
    /// Stale entries are left in place; staleness is a read-time check,
    /// not a cleanup trigger.
    #[must_use]
    pub fn read_with_max_age(&self, key: &str, max_age_ms: u64) -> Option<serde_json::Value> {
        let now = UnixMillis::now();
        let global = self.global_version.load(Ordering::SeqCst);
        let entries = self.entries.read().expect("cache lock poisoned");
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(now, max_age_ms, global))
            .map(|entry| entry.value.clone())
    }

    /// Returns the value under `key` regardless of freshness.
    ///
    /// Backs the "show stale data with a couldn't-refresh indicator"
    /// path: previously loaded content beats a blank UI.
    #[must_use]
    pub fn read_stale(&self, key: &str) -> Option<serde_json::Value> {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .get(key)
            .map(|entry| entry.value.clone())
    }

    /// Lazily invalidates every entry by bumping the global version.
    ///
    /// O(1); nothing is deleted. `reason` is recorded for diagnostics
    /// only. The bumped counter is persisted so the invalidation holds
    /// across a restart even if no write follows it.
    pub fn invalidate(&self, reason: &str) {
        let version = self.global_version.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.set(&self.storage_key(VERSION_KEY), &version.to_string()) {
                warn!("cache version persist failed: {e}");
            }
        }
        debug!("cache invalidated (version {version}): {reason}");
    }

    /// Removes every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, reason: &str, prefix: &str) {
        let removed: Vec<String> = {
            let mut entries = self.entries.write().expect("cache lock poisoned");
            let keys: Vec<String> = entries
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            for key in &keys {
                entries.remove(key);
            }
            keys
        };

        if let Some(storage) = &self.storage {
            for key in &removed {
                if let Err(e) = storage.remove(&self.storage_key(key)) {
                    warn!("cache persist removal failed for {key}: {e}");
                }
            }
        }

        debug!("cache prefix {prefix} evicted {} entries: {reason}", removed.len());
    }

    /// Removes a single entry.
    pub fn evict(&self, key: &str) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .remove(key);
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.remove(&self.storage_key(key)) {
                warn!("cache persist removal failed for {key}: {e}");
            }
        }
    }

    /// Current entry count and approximate serialized size.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().expect("cache lock poisoned");
        let approx_bytes = entries
            .values()
            .map(|entry| entry.value.to_string().len())
            .sum();
        CacheStats {
            entries: entries.len(),
            approx_bytes,
            global_version: self.global_version.load(Ordering::SeqCst),
        }
    }

    /// Current global version stamp.
    #[must_use]
    pub fn global_version(&self) -> u64 {
        self.global_version.load(Ordering::SeqCst)
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{key}", self.namespace)
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}
