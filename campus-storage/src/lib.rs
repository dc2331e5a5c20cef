//! Durable local storage for the CampusHub sync core.
//!
//! Cache entries and queued sync tasks must survive a process restart, but
//! the coordinator logic should not care where they land. This crate
//! defines the `StorageAdapter` seam — a flat string key/value contract —
//! with two implementations:
//!
//! - `SqliteStorage`: a single-table SQLite store for real deployments
//! - `MemoryStorage`: a `HashMap` store for tests and degraded operation
//!
//! Callers namespace their keys with a stable prefix (e.g. `cache:` or
//! `syncq:`) and use `keys(prefix)` to enumerate their own slice.

mod adapter;
mod error;
mod memory;
mod sqlite;

pub use adapter::StorageAdapter;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
