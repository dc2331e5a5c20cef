//! Sync task types.
//!
//! A task is one deferred mutation (a write made while offline, or one
//! deliberately queued for later). Tasks are owned by the sync queue until
//! dequeued, then by the coordinator through execution. The payload is an
//! opaque JSON value interpreted only by the handler registered for the
//! task's type.

use crate::{TaskId, UnixMillis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Scheduling priority for a sync task.
///
/// Ordering is by urgency: `High < Normal < Low`, so an ascending sort
/// puts the most urgent tasks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    /// Numeric rank, lower is more urgent.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Lifecycle status of a sync task.
///
/// `queued → in_progress → completed`, or `in_progress → queued` on a
/// retriable failure until the attempt ceiling moves the task to `dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Dead,
}

impl TaskStatus {
    /// True for states a task never leaves.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Dead)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

/// A deferred mutation waiting to be replayed against the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    /// Unique identifier for this task.
    pub id: TaskId,

    /// Handler key, e.g. `"listing:update"` or `"profile:save"`.
    pub task_type: String,

    /// Opaque mutation payload, interpreted by the handler.
    pub payload: serde_json::Value,

    /// Scheduling priority.
    pub priority: Priority,

    /// When the task was enqueued; FIFO tie-break within a priority.
    pub enqueued_at: UnixMillis,

    /// Number of execution attempts so far.
    pub attempts: u32,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Earliest time the task may run (advanced by retry backoff).
    pub eligible_at: UnixMillis,

    /// When the task last changed status; drives terminal-state pruning.
    pub updated_at: UnixMillis,
}

impl SyncTask {
    /// Creates a new task in the `Queued` state, immediately eligible.
    #[must_use]
    pub fn new(
        task_type: impl Into<String>,
        payload: serde_json::Value,
        priority: Priority,
    ) -> Self {
        let now = UnixMillis::now();
        Self {
            id: TaskId::new(),
            task_type: task_type.into(),
            payload,
            priority,
            enqueued_at: now,
            attempts: 0,
            status: TaskStatus::Queued,
            eligible_at: now,
            updated_at: now,
        }
    }

    /// Whether the task is queued and past its backoff window.
    #[must_use]
    pub fn is_runnable(&self, now: UnixMillis) -> bool {
        self.status == TaskStatus::Queued && self.eligible_at <= now
    }

    /// Whether the task has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
