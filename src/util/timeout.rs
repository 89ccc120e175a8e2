//! Deadlines for engine work.

use std::future::Future;
use std::time::Duration;

use crate::error::VoxError;

/// Fail with [`VoxError::Timeout`] if `future` outlives `duration`.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, VoxError>>,
) -> Result<T, VoxError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(timeout_ms = duration.as_millis() as u64, "deadline elapsed");
            Err(VoxError::Timeout(duration.as_millis() as u64))
        }
    }
}

/// Like [`with_timeout`], but `None` leaves `future` unbounded so an outer
/// deadline is the only one that applies.
pub async fn with_deadline<T>(
    deadline: Option<Duration>,
    future: impl Future<Output = Result<T, VoxError>>,
) -> Result<T, VoxError> {
    match deadline {
        Some(duration) => with_timeout(duration, future).await,
        None => future.await,
    }
}
