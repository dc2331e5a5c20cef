//! The sync coordinator.
//!
//! A cooperative background loop that drains the queue while online. On
//! success the affected cache slice is invalidated and a `Completed`
//! event is emitted; on a transient failure the task is requeued with
//! exponential backoff (`base * 2^attempts`, capped). While offline the
//! loop is suspended entirely; an offline→online transition wakes it
//! immediately and drains the whole queue.

use crate::error::TaskError;
use crate::queue::{SyncQueue, TERMINAL_RETENTION_MS};
use async_trait::async_trait;
use campus_cache::CacheStore;
use campus_types::{Priority, SyncTask, TaskId, TaskStatus, UnixMillis};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// First retry delay.
pub const BASE_BACKOFF_MS: u64 = 1_000;

/// Ceiling on a single backoff delay.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Longest the drain loop idles before re-checking the queue.
const IDLE_POLL_MS: u64 = 60_000;

/// Lifecycle events emitted by the coordinator.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A task was accepted into the queue.
    Queued { id: TaskId, task_type: String },
    /// A task executed successfully.
    Completed { id: TaskId, task_type: String },
    /// A task attempt failed. `dead` marks exhausted retries (or a
    /// validation failure), after which the task is never retried.
    Failed {
        id: TaskId,
        task_type: String,
        attempts: u32,
        dead: bool,
        error: String,
    },
}

/// Point-in-time view of the sync pipeline.
///
/// Computed on demand from the queue and the online watch, never stored,
/// so it cannot drift from the queue's true state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub is_online: bool,
    pub queue_size: usize,
    pub in_progress: usize,
}

/// Executes one kind of deferred mutation, keyed by `task_type`.
///
/// Supplied by the external API collaborator; each handler performs one
/// authenticated call against the backend.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Performs the mutation.
    async fn execute(&self, task: &SyncTask) -> Result<(), TaskError>;

    /// Cache key prefix this mutation affects; invalidated on success.
    fn cache_prefix(&self, _task: &SyncTask) -> Option<String> {
        None
    }
}

struct Inner {
    queue: Mutex<SyncQueue>,
    cache: Arc<CacheStore>,
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
    online_rx: watch::Receiver<bool>,
    events: broadcast::Sender<SyncEvent>,
    wake: Notify,
    stop: Notify,
    stopped: AtomicBool,
}

/// Drains the sync queue against network state.
pub struct SyncCoordinator {
    inner: Arc<Inner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SyncCoordinator {
    /// Creates a coordinator over a queue, cache, and online watch.
    ///
    /// Handlers are registered separately; `start` spawns the drain loop.
    #[must_use]
    pub fn new(
        queue: SyncQueue,
        cache: Arc<CacheStore>,
        online_rx: watch::Receiver<bool>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(queue),
                cache,
                handlers: RwLock::new(HashMap::new()),
                online_rx,
                events,
                wake: Notify::new(),
                stop: Notify::new(),
                stopped: AtomicBool::new(false),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Hydrates the queue from persisted records. Call before `start`.
    pub fn load_queue(&self) {
        self.inner
            .queue
            .lock()
            .expect("queue lock poisoned")
            .load();
    }

    /// Registers the handler for a task type, replacing any previous one.
    pub fn register_handler(&self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.inner
            .handlers
            .write()
            .expect("handler lock poisoned")
            .insert(task_type.into(), handler);
    }

    /// Spawns the background drain loop.
    pub fn start(&self) {
        let mut handle = self.handle.lock().expect("coordinator lock poisoned");
        if handle.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *handle = Some(tokio::spawn(async move {
            Inner::run(inner).await;
        }));
        info!("sync coordinator started");
    }

    /// Stops the drain loop and waits for it to exit.
    pub async fn shutdown(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so the loop sees the stop even if it
        // has not reached its select yet.
        self.inner.stop.notify_one();
        let handle = self
            .handle
            .lock()
            .expect("coordinator lock poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("sync coordinator stopped");
    }

    /// Queues a mutation for eventual delivery and emits `Queued`.
    pub fn queue_sync(
        &self,
        task_type: impl Into<String>,
        payload: serde_json::Value,
        priority: Priority,
    ) -> TaskId {
        let task = SyncTask::new(task_type, payload, priority);
        let task_type = task.task_type.clone();
        let id = self
            .inner
            .queue
            .lock()
            .expect("queue lock poisoned")
            .enqueue(task);
        self.inner.emit(SyncEvent::Queued { id, task_type });
        self.inner.wake.notify_one();
        id
    }

    /// Cancels a still-queued task. No-op for in-progress or terminal
    /// tasks.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.inner
            .queue
            .lock()
            .expect("queue lock poisoned")
            .remove(id)
    }

    /// Drains every eligible task right now, ignoring backoff timers.
    pub async fn force_sync_all(&self) {
        loop {
            let task = self
                .inner
                .queue
                .lock()
                .expect("queue lock poisoned")
                .dequeue_next_ignoring_backoff(UnixMillis::now());
            match task {
                Some(task) => self.inner.execute_task(task).await,
                None => break,
            }
        }
    }

    /// Current `{is_online, queue_size, in_progress}` snapshot.
    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        let queue = self.inner.queue.lock().expect("queue lock poisoned");
        SyncStatus {
            is_online: *self.inner.online_rx.borrow(),
            queue_size: queue.len(),
            in_progress: queue.in_progress(),
        }
    }

    /// Looks up a task snapshot by ID (including recently finished ones,
    /// until they are pruned).
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<SyncTask> {
        self.inner
            .queue
            .lock()
            .expect("queue lock poisoned")
            .get(id)
            .cloned()
    }

    /// Subscribes to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }
}

impl Inner {
    async fn run(inner: Arc<Self>) {
        let mut online = inner.online_rx.clone();
        loop {
            if inner.stopped.load(Ordering::SeqCst) {
                break;
            }

            let is_online = *online.borrow_and_update();
            if !is_online {
                // Offline: suspend entirely until connectivity returns.
                tokio::select! {
                    _ = online.changed() => {
                        if *online.borrow() {
                            info!("back online, draining sync queue");
                        }
                    }
                    _ = inner.stop.notified() => break,
                }
                continue;
            }

            let task = inner
                .queue
                .lock()
                .expect("queue lock poisoned")
                .dequeue_next(UnixMillis::now());

            match task {
                Some(task) => {
                    inner.execute_task(task).await;
                }
                None => {
                    let now = UnixMillis::now();
                    let wait_ms = {
                        let mut queue = inner.queue.lock().expect("queue lock poisoned");
                        queue.prune_terminal(TERMINAL_RETENTION_MS, now);
                        queue.next_eligible_in(now)
                    };
                    let sleep_ms = wait_ms.map_or(IDLE_POLL_MS, |ms| ms.clamp(1, IDLE_POLL_MS));
                    tokio::select! {
                        _ = inner.wake.notified() => {}
                        _ = online.changed() => {}
                        _ = inner.stop.notified() => break,
                        _ = tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)) => {}
                    }
                }
            }
        }
    }

    async fn execute_task(&self, task: SyncTask) {
        let handler = self
            .handlers
            .read()
            .expect("handler lock poisoned")
            .get(&task.task_type)
            .cloned();

        let Some(handler) = handler else {
            warn!("no handler for task type {}, dropping {}", task.task_type, task.id);
            self.queue
                .lock()
                .expect("queue lock poisoned")
                .mark_dead(task.id);
            self.emit(SyncEvent::Failed {
                id: task.id,
                task_type: task.task_type,
                attempts: task.attempts,
                dead: true,
                error: "no handler registered".to_string(),
            });
            return;
        };

        match handler.execute(&task).await {
            Ok(()) => {
                self.queue
                    .lock()
                    .expect("queue lock poisoned")
                    .complete(task.id);
                if let Some(prefix) = handler.cache_prefix(&task) {
                    self.cache.invalidate_prefix("sync task completed", &prefix);
                }
                debug!("task {} ({}) completed", task.id, task.task_type);
                self.emit(SyncEvent::Completed {
                    id: task.id,
                    task_type: task.task_type,
                });
            }
            Err(TaskError::Validation(msg)) => {
                warn!("task {} ({}) invalid, dropping: {msg}", task.id, task.task_type);
                self.queue
                    .lock()
                    .expect("queue lock poisoned")
                    .mark_dead(task.id);
                self.emit(SyncEvent::Failed {
                    id: task.id,
                    task_type: task.task_type,
                    attempts: task.attempts,
                    dead: true,
                    error: msg,
                });
            }
            Err(TaskError::Transient(msg)) => {
                let backoff = backoff_ms(task.attempts);
                let status = self
                    .queue
                    .lock()
                    .expect("queue lock poisoned")
                    .requeue(task.id, backoff);
                let dead = status == Some(TaskStatus::Dead);
                debug!(
                    "task {} ({}) failed (attempt {}): {msg}",
                    task.id,
                    task.task_type,
                    task.attempts + 1
                );
                self.emit(SyncEvent::Failed {
                    id: task.id,
                    task_type: task.task_type,
                    attempts: task.attempts + 1,
                    dead,
                    error: msg,
                });
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Exponential backoff: `BASE * 2^attempts`, capped at `MAX_BACKOFF_MS`.
#[must_use]
pub(crate) fn backoff_ms(attempts: u32) -> u64 {
    let shift = attempts.min(16);
    BASE_BACKOFF_MS
        .saturating_mul(1u64 << shift)
        .min(MAX_BACKOFF_MS)
}
