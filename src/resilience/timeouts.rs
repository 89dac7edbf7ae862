//! Deadline and cancellation enforcement.
//!
//! # Responsibilities
//! - Wrap every network round trip with a deadline
//! - Abort cleanly when the caller's cancellation token fires
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities and `tokio_util` cancellation tokens
//! - Timeout and cancellation are distinct outcomes
//! - Cancellation wins a tie with the deadline

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a guarded future did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeadlineError {
    /// The deadline elapsed first.
    #[error("deadline of {0:?} elapsed")]
    Timeout(Duration),
    /// The cancellation token fired first.
    #[error("cancelled")]
    Cancelled,
}

/// Run `future` until it completes, `duration` elapses or `cancel` fires.
pub async fn with_deadline<F>(
    duration: Duration,
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, DeadlineError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DeadlineError::Cancelled),
        result = tokio::time::timeout(duration, future) => {
            result.map_err(|_| DeadlineError::Timeout(duration))
        }
    }
}
