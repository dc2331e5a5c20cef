//! Caching layer for the CampusHub sync core.
//!
//! Two components sit between the UI-facing state façade and the network:
//!
//! - **`CacheStore`**: key/value cache where every entry carries its own
//!   TTL and a version stamp. Bumping the store's global version lazily
//!   invalidates every entry in O(1) — no sweep, no deletion; staleness
//!   is purely a read-time check. Entries are written through to a
//!   `StorageAdapter` best-effort, so a persistence failure degrades to
//!   memory-only instead of surfacing to callers.
//! - **`RequestDeduplicator`**: coalesces concurrent fetches for the same
//!   key into a single in-flight future, so N simultaneous consumers cost
//!   exactly one network call.

mod dedup;
mod error;
mod store;

pub use dedup::RequestDeduplicator;
pub use error::{FetchError, FetchResult};
pub use store::{CacheEntry, CacheStats, CacheStore};
