//! Dispatch loop driving the external indexing worker.
//!
//! The scheduler owns the task queue and the pending-task map. It keeps at
//! most one task in flight: a task is popped and submitted only while
//! nothing is pending, and the slot is released by the worker's completion
//! callback or when the max task duration elapses.
//!
//! ```text
//!  producers ──task──▶ intake ─▶ TaskQueue ─pop─▶ IndexWorker::submit
//!                                    ▲                 │
//!                         transport failure (requeue)  │ accepted
//!                                                      ▼
//!  worker ──callback──▶ callback channel ─────▶ pending map (by task id)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

use super::client::IndexWorker;
use super::queue::{PushOutcome, TaskQueue};
use super::task::{IndexTask, TaskCallback, TaskStatus};

/// The scheduler loop has stopped and no longer accepts input.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Dispatch scheduler has shut down")]
pub struct SchedulerClosed;

/// Timer windows used by the loop.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Retry window while idle or after a failed submission.
    pub poll_interval: Duration,
    /// How long a dispatched task may hold the in-flight slot.
    pub max_task_duration: Duration,
}

impl From<&WorkerConfig> for SchedulerConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_task_duration: config.max_task_duration(),
        }
    }
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A task was accepted by the worker and is now pending.
    Dispatched { task_id: String },
    /// Submission failed; the task went back into the queue.
    Requeued,
    /// Nothing queued.
    Empty,
    /// A task is already in flight.
    Busy,
}

/// How a completion callback was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Completed,
    /// Worker reported failure; the task is dropped.
    Failed,
    /// No pending task carries this id (stale or duplicate delivery).
    Unknown,
}

/// Cloneable producer side of the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    task_tx: mpsc::Sender<IndexTask>,
    callback_tx: mpsc::Sender<TaskCallback>,
}

impl SchedulerHandle {
    /// Queue a task for dispatch.
    pub async fn push(&self, task: IndexTask) -> Result<(), SchedulerClosed> {
        self.task_tx.send(task).await.map_err(|_| SchedulerClosed)
    }

    /// Deliver a worker completion callback.
    pub async fn complete(&self, callback: TaskCallback) -> Result<(), SchedulerClosed> {
        self.callback_tx
            .send(callback)
            .await
            .map_err(|_| SchedulerClosed)
    }
}

pub struct Scheduler {
    worker: Arc<dyn IndexWorker>,
    config: SchedulerConfig,
    queue: TaskQueue,
    /// Dispatched but unconfirmed tasks: task id -> task.
    pending: HashMap<String, IndexTask>,
    task_rx: mpsc::Receiver<IndexTask>,
    callback_rx: mpsc::Receiver<TaskCallback>,
}

impl Scheduler {
    /// Create a scheduler and the handle producers use to reach it.
    pub fn new(
        worker: Arc<dyn IndexWorker>,
        config: SchedulerConfig,
        capacity: usize,
    ) -> (Self, SchedulerHandle) {
        let (task_tx, task_rx) = mpsc::channel(capacity.max(1));
        let (callback_tx, callback_rx) = mpsc::channel(capacity.max(1));
        let scheduler = Self {
            worker,
            config,
            queue: TaskQueue::new(),
            pending: HashMap::new(),
            task_rx,
            callback_rx,
        };
        (
            scheduler,
            SchedulerHandle {
                task_tx,
                callback_tx,
            },
        )
    }

    /// Run until `shutdown` is cancelled or every handle is dropped.
    ///
    /// Each iteration handles exactly one input: an incoming task, a
    /// completion callback, or the dispatch timer.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let timer = sleep(self.config.poll_interval);
        tokio::pin!(timer);
        let mut intake_open = true;
        let mut callbacks_open = true;

        crate::log_event!("scheduler", "started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                callback = self.callback_rx.recv(), if callbacks_open => match callback {
                    Some(callback) => {
                        self.on_callback(callback);
                        let outcome = self.dispatch_next().await;
                        if let Some(wait) = self.next_wait(&outcome) {
                            timer.as_mut().reset(Instant::now() + wait);
                        }
                    }
                    None => callbacks_open = false,
                },

                _ = &mut timer => {
                    self.expire_pending();
                    let outcome = self.dispatch_next().await;
                    let wait = self.next_wait(&outcome).unwrap_or(self.config.poll_interval);
                    timer.as_mut().reset(Instant::now() + wait);
                }

                task = self.task_rx.recv(), if intake_open => match task {
                    Some(task) => {
                        self.enqueue(task);
                    }
                    None => intake_open = false,
                },
            }

            if !intake_open && !callbacks_open {
                break;
            }
        }

        crate::log_event!(
            "scheduler",
            "stopped",
            "{} queued, {} pending",
            self.queue.len(),
            self.pending.len()
        );
    }

    /// Merge a task into the queue.
    pub fn enqueue(&mut self, task: IndexTask) -> PushOutcome {
        let path = task.filepath.clone();
        let action = task.action;
        let outcome = self.queue.push(task);
        crate::debug_event!(
            "queue",
            "push",
            "{action} {} -> {outcome:?} ({} queued)",
            path.display(),
            self.queue.len()
        );
        outcome
    }

    /// Pop and submit the next task if nothing is in flight.
    pub async fn dispatch_next(&mut self) -> DispatchOutcome {
        if !self.is_idle() {
            return DispatchOutcome::Busy;
        }
        let Some(mut task) = self.queue.pop() else {
            return DispatchOutcome::Empty;
        };

        task.task_id = uuid::Uuid::new_v4().to_string();
        match self.worker.submit(&task).await {
            Ok(body) => {
                crate::debug_event!("scheduler", "worker response", "{body}");
                let task_id = task.task_id.clone();
                crate::log_event!(
                    "scheduler",
                    "dispatched",
                    "{} {} {}",
                    task_id,
                    task.action,
                    task.filepath.display()
                );
                self.pending.insert(task_id.clone(), task);
                DispatchOutcome::Dispatched { task_id }
            }
            Err(e) => {
                tracing::error!(
                    "[scheduler] dispatch of {} failed, requeueing: {e}",
                    task.filepath.display()
                );
                task.task_id.clear();
                self.queue.push(task);
                DispatchOutcome::Requeued
            }
        }
    }

    /// Apply a completion callback to the pending map.
    ///
    /// Failed tasks are not requeued, unlike submissions that fail in
    /// transport.
    pub fn on_callback(&mut self, callback: TaskCallback) -> CallbackOutcome {
        let Some(task) = self.pending.remove(&callback.task_id) else {
            tracing::warn!(
                "[scheduler] callback for unknown task {} ({:?}), ignoring",
                callback.task_id,
                callback.status
            );
            return CallbackOutcome::Unknown;
        };

        match callback.status {
            TaskStatus::Done => {
                crate::log_event!(
                    "scheduler",
                    "done",
                    "{} {}",
                    callback.task_id,
                    task.filepath.display()
                );
                CallbackOutcome::Completed
            }
            TaskStatus::Failed => {
                tracing::warn!(
                    "[scheduler] task {} failed for {}, dropping",
                    callback.task_id,
                    task.filepath.display()
                );
                CallbackOutcome::Failed
            }
        }
    }

    /// Release the in-flight slot after the max task duration.
    pub fn expire_pending(&mut self) -> usize {
        let expired = self.pending.len();
        for (task_id, task) in self.pending.drain() {
            tracing::warn!(
                "[scheduler] task {task_id} for {} exceeded max duration, releasing slot",
                task.filepath.display()
            );
        }
        expired
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Pending task by id.
    pub fn pending(&self, task_id: &str) -> Option<&IndexTask> {
        self.pending.get(task_id)
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    #[cfg(test)]
    pub(crate) async fn next_callback(&mut self) -> Option<TaskCallback> {
        self.callback_rx.recv().await
    }

    fn next_wait(&self, outcome: &DispatchOutcome) -> Option<Duration> {
        match outcome {
            DispatchOutcome::Dispatched { .. } => Some(self.config.max_task_duration),
            DispatchOutcome::Requeued | DispatchOutcome::Empty => Some(self.config.poll_interval),
            DispatchOutcome::Busy => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::client::WorkerError;
    use crate::tasks::task::TaskAction;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records submissions and fails the first `fail_first` of them.
    #[derive(Default)]
    struct FakeWorker {
        submitted: Mutex<Vec<IndexTask>>,
        fail_first: AtomicUsize,
    }

    impl FakeWorker {
        fn failing(count: usize) -> Self {
            Self {
                submitted: Mutex::new(Vec::new()),
                fail_first: AtomicUsize::new(count),
            }
        }

        fn submitted(&self) -> Vec<IndexTask> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl IndexWorker for FakeWorker {
        async fn submit(&self, task: &IndexTask) -> Result<String, WorkerError> {
            self.submitted.lock().unwrap().push(task.clone());
            let remaining = self.fail_first.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_first.store(remaining - 1, Ordering::SeqCst);
                return Err(WorkerError::Transport {
                    url: "http://worker".into(),
                    reason: "connection refused".into(),
                });
            }
            Ok("ok".into())
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(5),
            max_task_duration: Duration::from_secs(1800),
        }
    }

    fn scheduler(worker: Arc<FakeWorker>) -> Scheduler {
        Scheduler::new(worker, config(), 16).0
    }

    fn insert(path: &str) -> IndexTask {
        IndexTask::at(Path::new(path), TaskAction::Add, 100)
    }

    #[tokio::test]
    async fn test_single_task_in_flight() {
        let worker = Arc::new(FakeWorker::default());
        let mut scheduler = scheduler(worker.clone());
        scheduler.enqueue(insert("/data/a.txt"));
        scheduler.enqueue(insert("/data/b.txt"));

        assert!(matches!(
            scheduler.dispatch_next().await,
            DispatchOutcome::Dispatched { .. }
        ));
        assert_eq!(scheduler.dispatch_next().await, DispatchOutcome::Busy);
        assert_eq!(worker.submitted().len(), 1);
        assert_eq!(scheduler.queue().len(), 1);
    }

    #[tokio::test]
    async fn test_done_callback_releases_slot() {
        let worker = Arc::new(FakeWorker::default());
        let mut scheduler = scheduler(worker.clone());
        scheduler.enqueue(insert("/data/f.txt"));

        let DispatchOutcome::Dispatched { task_id } = scheduler.dispatch_next().await else {
            panic!("expected dispatch");
        };
        assert_eq!(scheduler.pending(&task_id).unwrap().task_id, task_id);

        let done = TaskCallback {
            task_id: task_id.clone(),
            status: TaskStatus::Done,
        };
        assert_eq!(scheduler.on_callback(done.clone()), CallbackOutcome::Completed);
        assert!(scheduler.is_idle());
        assert!(scheduler.queue().is_empty());

        // Duplicate delivery is a no-op
        assert_eq!(scheduler.on_callback(done), CallbackOutcome::Unknown);
        assert!(scheduler.queue().is_empty());
    }

    #[tokio::test]
    async fn test_failed_callback_is_not_retried() {
        let worker = Arc::new(FakeWorker::default());
        let mut scheduler = scheduler(worker.clone());
        scheduler.enqueue(insert("/data/bad.pdf"));

        let DispatchOutcome::Dispatched { task_id } = scheduler.dispatch_next().await else {
            panic!("expected dispatch");
        };
        let outcome = scheduler.on_callback(TaskCallback {
            task_id,
            status: TaskStatus::Failed,
        });
        assert_eq!(outcome, CallbackOutcome::Failed);
        assert!(scheduler.is_idle());
        assert!(scheduler.queue().is_empty());
        assert_eq!(scheduler.dispatch_next().await, DispatchOutcome::Empty);
    }

    #[tokio::test]
    async fn test_transport_failure_requeues_with_new_id() {
        let worker = Arc::new(FakeWorker::failing(1));
        let mut scheduler = scheduler(worker.clone());
        scheduler.enqueue(insert("/data/t.txt"));

        assert_eq!(scheduler.dispatch_next().await, DispatchOutcome::Requeued);
        assert!(scheduler.is_idle());
        assert!(scheduler.queue().contains(Path::new("/data/t.txt")));

        let DispatchOutcome::Dispatched { task_id } = scheduler.dispatch_next().await else {
            panic!("expected redispatch");
        };
        let attempts = worker.submitted();
        assert_eq!(attempts.len(), 2);
        let old_id = attempts[0].task_id.clone();
        assert_ne!(old_id, task_id);

        // A callback naming the failed attempt is ignored
        let outcome = scheduler.on_callback(TaskCallback {
            task_id: old_id,
            status: TaskStatus::Done,
        });
        assert_eq!(outcome, CallbackOutcome::Unknown);
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_requeue_loses_to_newer_event() {
        let worker = Arc::new(FakeWorker::failing(1));
        let mut scheduler = scheduler(worker.clone());
        scheduler.enqueue(insert("/data/t.txt"));

        // A removal arrives while the insert is being submitted
        let task = scheduler.queue.pop().unwrap();
        scheduler.enqueue(IndexTask::at(Path::new("/data/t.txt"), TaskAction::Delete, 200));
        scheduler.queue.push(task);

        // The requeued insert is older than the queued removal and is ignored
        let queued = scheduler.queue().get(Path::new("/data/t.txt")).unwrap();
        assert!(!queued.is_insert);
    }

    #[tokio::test]
    async fn test_expiry_releases_slot() {
        let worker = Arc::new(FakeWorker::default());
        let mut scheduler = scheduler(worker.clone());
        scheduler.enqueue(insert("/data/slow.txt"));
        scheduler.enqueue(insert("/data/next.txt"));

        let DispatchOutcome::Dispatched { task_id } = scheduler.dispatch_next().await else {
            panic!("expected dispatch");
        };
        assert_eq!(scheduler.expire_pending(), 1);
        assert!(matches!(
            scheduler.dispatch_next().await,
            DispatchOutcome::Dispatched { .. }
        ));

        // Late callback for the expired task takes the unknown path
        let outcome = scheduler.on_callback(TaskCallback {
            task_id,
            status: TaskStatus::Done,
        });
        assert_eq!(outcome, CallbackOutcome::Unknown);
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_dispatches_on_timer_and_callback() {
        let worker = Arc::new(FakeWorker::default());
        let (scheduler, handle) = Scheduler::new(worker.clone(), config(), 16);
        let shutdown = CancellationToken::new();
        let loop_task = tokio::spawn(scheduler.run(shutdown.clone()));

        handle.push(insert("/data/one.txt")).await.unwrap();
        handle.push(insert("/data/two.txt")).await.unwrap();

        // First poll window elapses and the head of the queue goes out
        tokio::time::sleep(Duration::from_secs(6)).await;
        let submitted = worker.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].filepath, Path::new("/data/one.txt"));

        // Completion immediately dispatches the next task
        handle
            .complete(TaskCallback {
                task_id: submitted[0].task_id.clone(),
                status: TaskStatus::Done,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let submitted = worker.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[1].filepath, Path::new("/data/two.txt"));

        shutdown.cancel();
        loop_task.await.unwrap();
    }
}
