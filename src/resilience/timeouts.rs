//! Timeout enforcement with detach-and-discard semantics.
//!
//! The work runs on its own task. When the deadline passes the caller stops
//! waiting and the task is detached: it keeps running to completion and its
//! result is dropped. Nothing here aborts in-flight I/O, so work run under a
//! timeout must not rely on being cancelled.

use std::future::Future;
use std::time::Duration;

/// Why a detached run produced no value.
#[derive(Debug, thiserror::Error)]
pub enum DetachError {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Spawn `work` and wait at most `timeout` for it.
pub async fn run_detached<F>(timeout: Duration, work: F) -> Result<F::Output, DetachError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handle = tokio::spawn(work);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => Err(DetachError::Panicked(join_error.to_string())),
        // Dropping the JoinHandle detaches the task.
        Err(_) => Err(DetachError::TimedOut(timeout)),
    }
}
