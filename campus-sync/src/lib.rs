//! Offline mutation queue and sync coordinator.
//!
//! Mutations made while offline (or deliberately deferred) are captured as
//! `SyncTask`s in a durable, priority-ordered queue and replayed against
//! the backend by a cooperative background loop.
//!
//! # Components
//!
//! - **`SyncQueue`**: strict-priority queue with FIFO tie-break, backed by
//!   a `StorageAdapter` so queued mutations survive a restart
//! - **`SyncCoordinator`**: drains the queue while online, applies
//!   exponential backoff on transient failures, invalidates the affected
//!   cache slice on success, and emits typed lifecycle events
//! - **`OnlineWatch`**: connectivity handle owned by the host app; an
//!   offline→online transition immediately wakes the drain loop
//!
//! # Task lifecycle
//!
//! `queued → in_progress → completed`, or `in_progress → queued` with
//! backoff on a transient failure, until the attempt ceiling moves the
//! task to `dead`. Validation failures skip the retry ladder entirely.
//! Terminal tasks are retained briefly for status queries, then pruned.

mod coordinator;
mod error;
mod online;
mod queue;

pub use coordinator::{
    SyncCoordinator, SyncEvent, SyncStatus, TaskHandler, BASE_BACKOFF_MS, MAX_BACKOFF_MS,
};
pub use error::TaskError;
pub use online::OnlineWatch;
pub use queue::{SyncQueue, MAX_ATTEMPTS, TERMINAL_RETENTION_MS};
