//! The storage adapter seam.

use crate::error::StorageResult;

/// A flat string key/value store.
///
/// The same coordinator logic runs against SQLite on disk, an in-memory
/// map in tests, or any future backend that can satisfy this contract.
/// Implementations must be safe to share across tasks.
pub trait StorageAdapter: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes the value stored under `key`. Missing keys are a no-op.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Returns all keys starting with `prefix`.
    fn keys(&self, prefix: &str) -> StorageResult<Vec<String>>;
}
