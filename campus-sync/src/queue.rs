//! The durable sync queue.
//!
//! Tasks are ordered by `(priority, enqueued_at)` — strict priority with
//! FIFO tie-break. Every mutation is written through to the storage
//! adapter immediately, so offline-queued mutations are not lost on
//! reload; persistence failures are logged and the in-memory queue keeps
//! going.

use campus_storage::StorageAdapter;
use campus_types::{SyncTask, TaskId, TaskStatus, UnixMillis};
use std::sync::Arc;
use tracing::{debug, warn};

/// Attempt ceiling: a task failing this many times transitions to `Dead`.
pub const MAX_ATTEMPTS: u32 = 5;

/// How long terminal tasks are retained for status queries before pruning.
pub const TERMINAL_RETENTION_MS: u64 = 60_000;

/// Priority-ordered, durable queue of pending mutations.
pub struct SyncQueue {
    tasks: Vec<SyncTask>,
    storage: Option<Arc<dyn StorageAdapter>>,
    namespace: String,
    max_attempts: u32,
}

impl SyncQueue {
    /// Creates a memory-only queue (tests, degraded operation).
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            storage: None,
            namespace: String::new(),
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Creates a queue persisted through `storage` under the given
    /// namespace prefix (e.g. `"syncq:"`).
    #[must_use]
    pub fn with_storage(storage: Arc<dyn StorageAdapter>, namespace: impl Into<String>) -> Self {
        Self {
            tasks: Vec::new(),
            storage: Some(storage),
            namespace: namespace.into(),
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Hydrates the queue from persisted records.
    ///
    /// Tasks found `InProgress` are reset to `Queued`: the process died
    /// mid-execution, so the mutation must be re-attempted. Unreadable
    /// records are skipped with a warning.
    pub fn load(&mut self) {
        let Some(storage) = self.storage.clone() else {
            return;
        };

        let keys = match storage.keys(&self.namespace) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("sync queue load failed, starting empty: {e}");
                return;
            }
        };

        for storage_key in keys {
            let raw = match storage.get(&storage_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!("sync queue load skipped {storage_key}: {e}");
                    continue;
                }
            };
            match serde_json::from_str::<SyncTask>(&raw) {
                Ok(mut task) => {
                    if task.status == TaskStatus::InProgress {
                        task.status = TaskStatus::Queued;
                        task.updated_at = UnixMillis::now();
                        self.persist(&task);
                    }
                    self.tasks.push(task);
                }
                Err(e) => {
                    warn!("sync queue load skipped malformed record {storage_key}: {e}");
                }
            }
        }

        debug!("sync queue hydrated: {} tasks", self.tasks.len());
    }

    /// Appends a task and returns its ID.
    pub fn enqueue(&mut self, task: SyncTask) -> TaskId {
        let id = task.id;
        debug!(
            "enqueued {} task {id} ({})",
            task.priority, task.task_type
        );
        self.persist(&task);
        self.tasks.push(task);
        id
    }

    /// Removes and returns the head runnable task, moving it to
    /// `InProgress`. Returns `None` if nothing is runnable.
    pub fn dequeue_next(&mut self, now: UnixMillis) -> Option<SyncTask> {
        self.dequeue_inner(now, false)
    }

    /// Like `dequeue_next`, but backoff timers are ignored (manual
    /// "retry now").
    pub fn dequeue_next_ignoring_backoff(&mut self, now: UnixMillis) -> Option<SyncTask> {
        self.dequeue_inner(now, true)
    }

    fn dequeue_inner(&mut self, now: UnixMillis, ignore_backoff: bool) -> Option<SyncTask> {
        let head = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                t.status == TaskStatus::Queued && (ignore_backoff || t.eligible_at <= now)
            })
            .min_by_key(|(_, t)| (t.priority, t.enqueued_at, t.id.to_string()))
            .map(|(i, _)| i)?;

        let task = &mut self.tasks[head];
        task.status = TaskStatus::InProgress;
        task.updated_at = now;
        let snapshot = task.clone();
        self.persist(&snapshot);
        Some(snapshot)
    }

    /// Returns a failed task to the queue with backoff, or kills it once
    /// the attempt ceiling is reached. Returns the resulting status.
    pub fn requeue(&mut self, id: TaskId, backoff_ms: u64) -> Option<TaskStatus> {
        let now = UnixMillis::now();
        let max_attempts = self.max_attempts;
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;

        task.attempts += 1;
        task.updated_at = now;
        if task.attempts >= max_attempts {
            task.status = TaskStatus::Dead;
            warn!(
                "task {id} ({}) dead after {} attempts",
                task.task_type, task.attempts
            );
        } else {
            task.status = TaskStatus::Queued;
            task.eligible_at = now.saturating_add(backoff_ms);
            debug!(
                "task {id} requeued, attempt {} eligible in {backoff_ms}ms",
                task.attempts
            );
        }

        let snapshot = task.clone();
        self.persist(&snapshot);
        Some(snapshot.status)
    }

    /// Marks a task `Completed`.
    pub fn complete(&mut self, id: TaskId) {
        self.transition(id, TaskStatus::Completed);
    }

    /// Marks a task `Dead` without consuming retries (validation
    /// failures, missing handlers).
    pub fn mark_dead(&mut self, id: TaskId) {
        self.transition(id, TaskStatus::Dead);
    }

    fn transition(&mut self, id: TaskId, status: TaskStatus) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            task.status = status;
            task.updated_at = UnixMillis::now();
            let snapshot = task.clone();
            self.persist(&snapshot);
        }
    }

    /// Cancels a task still in the `Queued` state. No-op if the task is
    /// already `InProgress` or terminal. Returns whether it was removed.
    pub fn remove(&mut self, id: TaskId) -> bool {
        let Some(index) = self
            .tasks
            .iter()
            .position(|t| t.id == id && t.status == TaskStatus::Queued)
        else {
            return false;
        };
        self.tasks.remove(index);
        self.remove_persisted(id);
        true
    }

    /// Drops terminal tasks older than `retain_ms`.
    pub fn prune_terminal(&mut self, retain_ms: u64, now: UnixMillis) {
        let expired: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.is_terminal() && t.updated_at.saturating_elapsed(now) >= retain_ms)
            .map(|t| t.id)
            .collect();
        if expired.is_empty() {
            return;
        }
        self.tasks.retain(|t| !expired.contains(&t.id));
        for id in &expired {
            self.remove_persisted(*id);
        }
        debug!("pruned {} terminal tasks", expired.len());
    }

    /// Milliseconds until the next queued task becomes eligible; `Some(0)`
    /// if one is runnable now, `None` if nothing is queued.
    #[must_use]
    pub fn next_eligible_in(&self, now: UnixMillis) -> Option<u64> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Queued)
            .map(|t| t.eligible_at.as_u64().saturating_sub(now.as_u64()))
            .min()
    }

    /// Looks up a task by ID.
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&SyncTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Number of tasks waiting in the `Queued` state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count(TaskStatus::Queued)
    }

    /// Whether no tasks are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tasks currently executing.
    #[must_use]
    pub fn in_progress(&self) -> usize {
        self.count(TaskStatus::InProgress)
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// Tasks ordered the way `dequeue_next` will take them.
    #[must_use]
    pub fn pending(&self) -> Vec<&SyncTask> {
        let mut pending: Vec<&SyncTask> = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Queued)
            .collect();
        pending.sort_by_key(|t| (t.priority, t.enqueued_at, t.id.to_string()));
        pending
    }

    fn persist(&self, task: &SyncTask) {
        let Some(storage) = &self.storage else {
            return;
        };
        match serde_json::to_string(task) {
            Ok(raw) => {
                if let Err(e) = storage.set(&self.storage_key(task.id), &raw) {
                    warn!("sync queue persist failed for {}: {e}", task.id);
                }
            }
            Err(e) => {
                warn!("sync task {} not serializable: {e}", task.id);
            }
        }
    }

    fn remove_persisted(&self, id: TaskId) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.remove(&self.storage_key(id)) {
                warn!("sync queue persist removal failed for {id}: {e}");
            }
        }
    }

    fn storage_key(&self, id: TaskId) -> String {
        format!("{}{id}", self.namespace)
    }
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new()
    }
}
