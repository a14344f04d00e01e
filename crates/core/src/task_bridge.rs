//! Background task bridge for single-threaded callers.
//!
//! A presentation loop that must never block submits long computations here.
//! Each submission runs on its own named worker thread and reports through a
//! private one-shot channel, so the loop only ever does a non-blocking check:
//!
//! ```ignore
//! let bridge = TaskBridge::new("analytics");
//! let mut poll = bridge
//!     .submit(move |_cancel| Ok(expensive()))
//!     .into_poller(|value| show(value), Some(|err| status_line(err)));
//!
//! // inside the loop
//! if poll() == PollStatus::Finished { /* stop polling */ }
//! ```
//!
//! Tasks are never preempted. [`TaskHandle::cancel`] raises a [`CancelToken`]
//! that the operation may check; whatever the worker eventually produces after
//! cancellation is discarded and no continuation runs.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, error};

/// Errors a bridged task can finish with.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The operation returned an error.
    #[error("task failed: {0:#}")]
    Operation(#[from] anyhow::Error),

    /// The task was cancelled before its result was collected.
    #[error("task cancelled")]
    Cancelled,

    /// The worker went away without reporting (it panicked).
    #[error("worker thread exited without a result")]
    WorkerLost,

    /// No worker thread could be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Lifecycle of a bridged task as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

/// Result of one call to a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Finished,
}

/// Cooperative cancellation flag shared between a handle and its worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(TaskError::Cancelled)` once cancellation was requested.
    ///
    /// Convenient as an early-exit check inside long operations.
    ///
    /// # Errors
    /// Returns [`TaskError::Cancelled`] if the token has been cancelled.
    pub fn check(&self) -> Result<(), TaskError> {
        if self.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Spawns background work for a caller that polls for completion.
#[derive(Debug)]
pub struct TaskBridge {
    name: String,
    next_id: AtomicU64,
}

impl TaskBridge {
    /// Creates a bridge whose worker threads are named `<name>-<id>`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Starts `operation` on a fresh worker thread.
    ///
    /// The operation receives the task's [`CancelToken`]. Its return value or
    /// error is delivered once through the returned handle.
    pub fn submit<T, F>(&self, operation: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> anyhow::Result<T> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelToken::new();
        let (tx, rx) = oneshot::channel();

        let worker_cancel = cancel.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("{}-{id}", self.name))
            .spawn(move || {
                let outcome = operation(&worker_cancel).map_err(|e| {
                    // Let operations signal cancellation through anyhow
                    match e.downcast::<TaskError>() {
                        Ok(task_error) => task_error,
                        Err(other) => TaskError::Operation(other),
                    }
                });
                // The receiver may already be gone; nothing left to report to.
                let _ = tx.send(outcome);
            });

        let mut handle = TaskHandle {
            id,
            receiver: Some(rx),
            cancel,
            state: TaskState::Pending,
            spawn_error: None,
        };

        match spawned {
            Ok(_) => debug!(task = id, bridge = %self.name, "Task submitted"),
            Err(e) => {
                error!(task = id, bridge = %self.name, "Failed to spawn worker: {}", e);
                handle.receiver = None;
                handle.spawn_error = Some(TaskError::Spawn(e));
            }
        }

        handle
    }
}

impl Default for TaskBridge {
    fn default() -> Self {
        Self::new("task-bridge")
    }
}

/// Caller-side view of one submitted task.
pub struct TaskHandle<T> {
    id: u64,
    receiver: Option<oneshot::Receiver<Result<T, TaskError>>>,
    cancel: CancelToken,
    state: TaskState,
    spawn_error: Option<TaskError>,
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> TaskHandle<T> {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// A clone of the task's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Requests cancellation.
    ///
    /// Has no effect once the result has been collected.
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.cancel.cancel();
        self.receiver = None;
        self.state = TaskState::Cancelled;
        debug!(task = self.id, "Task cancelled");
    }

    /// Non-blocking check for the task's outcome.
    ///
    /// Returns `None` while the task is pending and after the outcome has been
    /// taken. Returns `Some` exactly once per task.
    pub fn try_take(&mut self) -> Option<Result<T, TaskError>> {
        if let Some(err) = self.spawn_error.take() {
            self.state = TaskState::Failed;
            return Some(Err(err));
        }

        let receiver = self.receiver.as_mut()?;
        let outcome = match receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(TaskError::WorkerLost),
        };
        self.receiver = None;

        self.state = match &outcome {
            Ok(_) => TaskState::Completed,
            Err(TaskError::Cancelled) => TaskState::Cancelled,
            Err(_) => TaskState::Failed,
        };
        Some(outcome)
    }

    /// Waits for the task from async code.
    ///
    /// # Errors
    /// Returns the operation's error, [`TaskError::Cancelled`] if the task was
    /// cancelled, or [`TaskError::WorkerLost`] if the worker panicked.
    pub async fn join(mut self) -> Result<T, TaskError> {
        if let Some(err) = self.spawn_error.take() {
            return Err(err);
        }
        match self.receiver.take() {
            Some(receiver) => receiver.await.unwrap_or(Err(TaskError::WorkerLost)),
            None => Err(TaskError::Cancelled),
        }
    }

    /// Turns the handle into a zero-argument poll function.
    ///
    /// Each call is non-blocking. When the outcome arrives, `on_success` or
    /// `on_error` runs exactly once and the poller reports
    /// [`PollStatus::Finished`] from then on. Without an error continuation,
    /// failures are logged. Cancelled tasks finish without running either.
    pub fn into_poller<S, E>(
        mut self,
        on_success: S,
        on_error: Option<E>,
    ) -> impl FnMut() -> PollStatus
    where
        S: FnOnce(T),
        E: FnOnce(TaskError),
    {
        let mut on_success = Some(on_success);
        let mut on_error = on_error;

        move || {
            if self.state.is_terminal() {
                return PollStatus::Finished;
            }

            match self.try_take() {
                None => PollStatus::Pending,
                Some(Ok(value)) => {
                    if let Some(callback) = on_success.take() {
                        callback(value);
                    }
                    PollStatus::Finished
                }
                Some(Err(TaskError::Cancelled)) => PollStatus::Finished,
                Some(Err(err)) => {
                    match on_error.take() {
                        Some(callback) => callback(err),
                        None => error!(task = self.id, "Background task failed: {}", err),
                    }
                    PollStatus::Finished
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn drive<P: FnMut() -> PollStatus>(mut poll: P) -> usize {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut polls = 0;
        while poll() == PollStatus::Pending {
            polls += 1;
            assert!(Instant::now() < deadline, "task did not finish in time");
            std::thread::sleep(Duration::from_millis(2));
        }
        polls
    }

    #[test]
    fn test_success_continuation_runs_once() {
        let bridge = TaskBridge::new("test");
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);

        let mut poll = bridge
            .submit(|_| Ok(21 * 2))
            .into_poller(move |v| sink.borrow_mut().push(v), None::<fn(TaskError)>);

        drive(&mut poll);
        // Further polls stay finished and do not re-dispatch
        assert_eq!(poll(), PollStatus::Finished);
        assert_eq!(poll(), PollStatus::Finished);
        assert_eq!(*received.borrow(), vec![42]);
    }

    #[test]
    fn test_error_continuation_receives_error() {
        let bridge = TaskBridge::new("test");
        let message = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&message);

        let poll = bridge
            .submit::<u32, _>(|_| Err(anyhow!("boom")))
            .into_poller(
                |_| panic!("success continuation must not run"),
                Some(move |e: TaskError| *sink.borrow_mut() = Some(e.to_string())),
            );

        drive(poll);
        let message = message.borrow();
        assert!(message.as_deref().unwrap_or_default().contains("boom"));
    }

    #[test]
    fn test_missing_error_continuation_still_finishes() {
        let bridge = TaskBridge::new("test");
        let poll = bridge
            .submit::<u32, _>(|_| Err(anyhow!("logged only")))
            .into_poller(|_| panic!("unexpected success"), None::<fn(TaskError)>);

        drive(poll);
    }

    #[test]
    fn test_pending_until_worker_completes() {
        let bridge = TaskBridge::new("test");
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let mut handle = bridge.submit(move |_| {
            release_rx.recv()?;
            Ok("done")
        });

        assert_eq!(handle.state(), TaskState::Pending);
        assert!(handle.try_take().is_none());

        release_tx.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let outcome = loop {
            if let Some(outcome) = handle.try_take() {
                break outcome;
            }
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(2));
        };

        assert_eq!(outcome.unwrap(), "done");
        assert_eq!(handle.state(), TaskState::Completed);
        assert!(handle.try_take().is_none());
    }

    #[test]
    fn test_cancel_discards_result_and_skips_continuations() {
        let bridge = TaskBridge::new("test");
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (observed_tx, observed_rx) = mpsc::channel::<bool>();

        let mut handle = bridge.submit(move |cancel: &CancelToken| {
            release_rx.recv()?;
            observed_tx.send(cancel.is_cancelled())?;
            Ok(7)
        });
        handle.cancel();
        assert_eq!(handle.state(), TaskState::Cancelled);

        let mut poll = handle.into_poller(
            |_| panic!("cancelled task must not deliver"),
            Some(|_: TaskError| panic!("cancelled task must not report errors")),
        );
        assert_eq!(poll(), PollStatus::Finished);

        // The worker still runs to completion and can see the request
        release_tx.send(()).unwrap();
        assert!(observed_rx.recv_timeout(Duration::from_secs(5)).unwrap());
        assert_eq!(poll(), PollStatus::Finished);
    }

    #[test]
    fn test_operation_can_exit_early_on_cancel() {
        let bridge = TaskBridge::new("test");
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(token.check(), Err(TaskError::Cancelled)));

        let mut handle = bridge.submit(|cancel: &CancelToken| {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            cancel.check()?;
            Ok(())
        });
        let token = handle.cancel_token();
        token.cancel();

        let deadline = Instant::now() + Duration::from_secs(5);
        let outcome = loop {
            if let Some(outcome) = handle.try_take() {
                break outcome;
            }
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(2));
        };
        assert!(matches!(outcome, Err(TaskError::Cancelled)));
        assert_eq!(handle.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_panicking_worker_reports_worker_lost() {
        let bridge = TaskBridge::new("test");
        let mut handle = bridge.submit::<u8, _>(|_| panic!("worker exploded"));

        let deadline = Instant::now() + Duration::from_secs(5);
        let outcome = loop {
            if let Some(outcome) = handle.try_take() {
                break outcome;
            }
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(2));
        };
        assert!(matches!(outcome, Err(TaskError::WorkerLost)));
        assert_eq!(handle.state(), TaskState::Failed);
    }

    #[test]
    fn test_concurrent_submissions_do_not_share_results() {
        let bridge = TaskBridge::new("test");
        let mut slow = bridge.submit(|_| {
            std::thread::sleep(Duration::from_millis(30));
            Ok("slow")
        });
        let mut fast = bridge.submit(|_| Ok("fast"));
        assert_ne!(slow.id(), fast.id());

        let deadline = Instant::now() + Duration::from_secs(5);
        let (mut slow_out, mut fast_out) = (None, None);
        while slow_out.is_none() || fast_out.is_none() {
            if slow_out.is_none() {
                slow_out = slow.try_take();
            }
            if fast_out.is_none() {
                fast_out = fast.try_take();
            }
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(slow_out.unwrap().unwrap(), "slow");
        assert_eq!(fast_out.unwrap().unwrap(), "fast");
    }

    #[tokio::test]
    async fn test_join_from_async_caller() {
        let bridge = TaskBridge::new("test");
        let value = bridge.submit(|_| Ok(vec![1, 2, 3])).join().await.unwrap();
        assert_eq!(value, vec![1, 2, 3]);

        let mut cancelled = bridge.submit(|_| Ok(()));
        cancelled.cancel();
        assert!(matches!(cancelled.join().await, Err(TaskError::Cancelled)));
    }
}
