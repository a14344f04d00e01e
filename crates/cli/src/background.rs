//! Runs blocking work off the command loop.
//!
//! The binary drives a single-threaded runtime. Loading and analysis are handed to
//! a [`TaskBridge`] worker and the loop only polls for the result on a timer, so it
//! stays free to react to Ctrl-C and report progress.

use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tradechat_core::{CancelToken, PollStatus, TaskBridge, TaskError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Runs `operation` on a bridge worker and waits for it by polling.
///
/// # Errors
/// Returns the operation's error, or an error if the worker was lost or the user
/// interrupted the wait.
pub async fn run_in_background<T, F>(label: &str, operation: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> Result<T> + Send + 'static,
{
    let bridge = TaskBridge::new(label);
    let outcome: Rc<RefCell<Option<Result<T, TaskError>>>> = Rc::new(RefCell::new(None));

    let handle = bridge.submit(operation);
    let cancel = handle.cancel_token();
    let on_success = Rc::clone(&outcome);
    let on_error = Rc::clone(&outcome);
    let mut poll = handle.into_poller(
        move |value| *on_success.borrow_mut() = Some(Ok(value)),
        Some(move |err| *on_error.borrow_mut() = Some(Err(err))),
    );

    let started = Instant::now();
    let mut last_progress = started;
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if poll() == PollStatus::Finished {
                    break;
                }
                if last_progress.elapsed() >= PROGRESS_INTERVAL {
                    last_progress = Instant::now();
                    info!(task = label, elapsed_s = started.elapsed().as_secs(), "Still working");
                }
            }
            _ = &mut interrupt => {
                warn!(task = label, "Interrupted, abandoning background task");
                cancel.cancel();
                return Err(anyhow!("{label} interrupted"));
            }
        }
    }

    let result = outcome.borrow_mut().take();
    match result {
        Some(Ok(value)) => Ok(value),
        Some(Err(TaskError::Operation(e))) => Err(e),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow!("{label} finished without a result")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn test_returns_worker_value() {
        let value = run_in_background("test", |_| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_propagates_operation_error() {
        let err = run_in_background::<(), _>("test", |_| Err(anyhow!("no data")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no data");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_panicking_worker_is_an_error() {
        let result = run_in_background::<(), _>("test", |_| panic!("boom")).await;
        assert!(result.is_err());
    }
}
