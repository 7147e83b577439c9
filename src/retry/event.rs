//! Retry observation hooks.

use std::time::Duration;

use super::error::Cause;

/// Information about a failed attempt that is about to be retried.
///
/// Passed to the hook of
/// [`RetryingExecutor::execute_with_hooks`](crate::RetryingExecutor::execute_with_hooks).
/// Events exist only for transient failures; terminal failures are reported
/// through [`RequestFailed`](super::RequestFailed) instead.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// Which attempt just failed (0-indexed).
    pub attempt: u32,
    /// Why it failed.
    pub cause: &'a Cause<E>,
    /// Delay before the next attempt, jitter included.
    pub next_delay: Duration,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

/// A retry hook that records each retry as a `tracing` debug event.
///
/// # Examples
///
/// ```rust
/// use persevere::{retry::trace_retry, testing::ScriptedTransport, Request, Response, RetryingExecutor};
///
/// # tokio_test::block_on(async {
/// let executor = RetryingExecutor::new(ScriptedTransport::new([Ok(Response::new(200))]));
/// let response = executor
///     .execute_with_hooks(&Request::get("http://localhost"), trace_retry)
///     .await
///     .unwrap();
/// assert_eq!(response.status, 200);
/// # });
/// ```
#[cfg(feature = "tracing")]
pub fn trace_retry<E: std::fmt::Display>(event: &RetryEvent<'_, E>) {
    tracing::debug!(
        attempt = event.attempt,
        next_delay_ms = event.next_delay.as_millis() as u64,
        elapsed_ms = event.elapsed.as_millis() as u64,
        cause = %event.cause,
        "retrying request"
    );
}
