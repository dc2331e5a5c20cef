//! Core type definitions for the CampusHub sync core.
//!
//! This crate defines the fundamental, domain-agnostic types used by the
//! cache and data-synchronization coordinator:
//! - Task identifiers (UUID v7)
//! - Wall-clock millisecond timestamps
//! - Sync tasks with priority and lifecycle status
//!
//! Domain payloads (user profile, dashboard aggregates, AI insights, …)
//! are opaque `serde_json::Value`s here; their wire formats belong to the
//! REST collaborators, not to this crate.

mod ids;
mod task;
mod timestamp;

pub use ids::TaskId;
pub use task::{Priority, SyncTask, TaskStatus};
pub use timestamp::UnixMillis;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
