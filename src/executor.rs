//! The retrying request executor.
//!
//! Each call walks through attempts sequentially:
//!
//! ```text
//! Pending ──success──▶ Succeeded
//!    │
//!    ├──fatal status, or transient on last attempt──▶ Failed
//!    │
//!    └──transient (429 / transport error)──▶ Retrying ──delay──▶ Pending
//! ```
//!
//! All attempt state lives on the stack of the call; the executor itself is
//! immutable and can be shared between any number of concurrent calls.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::time::Instant;

use crate::request::{Request, Response};
use crate::retry::{BackoffPolicy, Cause, RequestFailed, RetryEvent};
use crate::transport::{Classifier, StatusClassifier, Transport, Verdict};

/// Executes requests over a [`Transport`], retrying transient failures with
/// exponential backoff and jitter.
///
/// # Examples
///
/// ```rust
/// use persevere::{testing::ScriptedTransport, BackoffPolicy, Request, Response, RetryingExecutor};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let transport = ScriptedTransport::new([
///     Ok(Response::new(429)),
///     Ok(Response::new(200).with_body("ok")),
/// ]);
/// let executor = RetryingExecutor::new(transport)
///     .with_policy(BackoffPolicy::exponential(Duration::from_millis(1)).without_jitter());
///
/// let response = executor.execute(&Request::get("http://localhost")).await.unwrap();
/// assert_eq!(response.text(), "ok");
/// assert_eq!(executor.transport().calls(), 2);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct RetryingExecutor<T, C = StatusClassifier> {
    transport: T,
    classifier: C,
    policy: BackoffPolicy,
}

impl<T> RetryingExecutor<T> {
    /// Create an executor with the default policy (3 attempts, 1s base, 1s
    /// jitter) and the default classifier (2xx success, 429 retryable).
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            classifier: StatusClassifier::default(),
            policy: BackoffPolicy::default(),
        }
    }
}

impl<T, C> RetryingExecutor<T, C> {
    /// Replace the backoff policy.
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for replacing the attempt bound of the current policy.
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.policy = self.policy.with_max_attempts(n);
        self
    }

    /// Replace the classifier.
    pub fn with_classifier<C2>(self, classifier: C2) -> RetryingExecutor<T, C2> {
        RetryingExecutor {
            transport: self.transport,
            classifier,
            policy: self.policy,
        }
    }

    /// The backoff policy in use.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The classifier in use.
    pub fn classifier(&self) -> &C {
        &self.classifier
    }
}

impl<T, C> RetryingExecutor<T, C>
where
    T: Transport,
    C: Classifier,
{
    /// Execute `request`, retrying transient failures.
    ///
    /// Returns the first successful response unmodified, or the terminal
    /// failure. Dropping the returned future abandons the pending attempt or
    /// delay; no further attempts are made.
    pub async fn execute(&self, request: &Request) -> Result<Response, RequestFailed<T::Error>> {
        self.run(request, &|_: &RetryEvent<'_, T::Error>| {}, &AtomicU32::new(0))
            .await
    }

    /// Execute `request`, calling `on_retry` before each backoff delay.
    ///
    /// The hook is synchronous and should not block; use it for logging or
    /// metrics.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persevere::{testing::ScriptedTransport, BackoffPolicy, Request, Response, RetryEvent, RetryingExecutor};
    /// use std::sync::Mutex;
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let executor = RetryingExecutor::new(ScriptedTransport::repeat(Ok(Response::new(429))))
    ///     .with_policy(BackoffPolicy::exponential(Duration::from_millis(1)).without_jitter());
    ///
    /// let delays = Mutex::new(Vec::new());
    /// let result = executor
    ///     .execute_with_hooks(&Request::get("http://localhost"), |event: &RetryEvent<'_, _>| {
    ///         delays.lock().unwrap().push(event.next_delay);
    ///     })
    ///     .await;
    ///
    /// assert_eq!(result.unwrap_err().status(), Some(429));
    /// assert_eq!(
    ///     *delays.lock().unwrap(),
    ///     vec![Duration::from_millis(1), Duration::from_millis(2)]
    /// );
    /// # });
    /// ```
    pub async fn execute_with_hooks<H>(
        &self,
        request: &Request,
        on_retry: H,
    ) -> Result<Response, RequestFailed<T::Error>>
    where
        H: Fn(&RetryEvent<'_, T::Error>),
    {
        self.run(request, &on_retry, &AtomicU32::new(0)).await
    }

    /// Execute `request` until `cancel` completes.
    ///
    /// If `cancel` resolves first, the pending transport call or delay is
    /// dropped and the call fails with [`Cause::Cancelled`]. An already
    /// resolved `cancel` prevents the first attempt.
    pub async fn execute_until<F>(
        &self,
        request: &Request,
        cancel: F,
    ) -> Result<Response, RequestFailed<T::Error>>
    where
        F: Future,
    {
        let attempts = AtomicU32::new(0);
        let start = Instant::now();

        tokio::select! {
            biased;
            _ = cancel => Err(RequestFailed::new(
                Cause::Cancelled,
                attempts.load(Ordering::Relaxed),
                start.elapsed(),
            )),
            result = self.run(request, &|_: &RetryEvent<'_, T::Error>| {}, &attempts) => result,
        }
    }

    async fn run<H>(
        &self,
        request: &Request,
        on_retry: &H,
        attempts: &AtomicU32,
    ) -> Result<Response, RequestFailed<T::Error>>
    where
        H: Fn(&RetryEvent<'_, T::Error>) + ?Sized,
    {
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempts.store(attempt + 1, Ordering::Relaxed);

            let cause = match self.transport.send(request).await {
                Ok(response) => match self.classifier.classify(&response) {
                    Verdict::Success => return Ok(response),
                    Verdict::Retryable => Cause::Status(response),
                    Verdict::Fatal => {
                        return Err(RequestFailed::new(
                            Cause::Status(response),
                            attempt + 1,
                            start.elapsed(),
                        ));
                    }
                },
                Err(error) => Cause::Transport(error),
            };

            match self.policy.delay_with_jitter(attempt) {
                Some(delay) => {
                    on_retry(&RetryEvent {
                        attempt,
                        cause: &cause,
                        next_delay: delay,
                        elapsed: start.elapsed(),
                    });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    return Err(RequestFailed::new(cause, attempt + 1, start.elapsed()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedError, ScriptedTransport};
    use std::time::Duration;

    fn fast(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy::exponential(Duration::from_millis(1))
            .without_jitter()
            .with_max_attempts(max_attempts)
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let executor = RetryingExecutor::new(ScriptedTransport::new([Ok(Response::new(200))]));

        let response = executor.execute(&Request::get("http://a")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(executor.transport().calls(), 1);
    }

    #[tokio::test]
    async fn test_fatal_status_not_retried() {
        let executor = RetryingExecutor::new(ScriptedTransport::repeat(Ok(Response::new(404))))
            .with_policy(fast(5));

        let err = executor.execute(&Request::get("http://a")).await.unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert_eq!(err.attempts, 1);
        assert_eq!(executor.transport().calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_retried_then_succeeds() {
        let executor = RetryingExecutor::new(ScriptedTransport::new([
            Err(ScriptedError::new("reset")),
            Ok(Response::new(200)),
        ]))
        .with_policy(fast(3));

        let response = executor.execute(&Request::get("http://a")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(executor.transport().calls(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_on_last_attempt_is_terminal() {
        let executor = RetryingExecutor::new(ScriptedTransport::repeat(Err(ScriptedError::new(
            "timed out",
        ))))
        .with_policy(fast(2));

        let err = executor.execute(&Request::get("http://a")).await.unwrap_err();

        assert_eq!(err.attempts, 2);
        assert_eq!(err.transport_error().map(|e| e.message()), Some("timed out"));
    }

    #[tokio::test]
    async fn test_custom_classifier() {
        let executor = RetryingExecutor::new(ScriptedTransport::new([
            Ok(Response::new(503)),
            Ok(Response::new(200)),
        ]))
        .with_policy(fast(3))
        .with_classifier(StatusClassifier::default().with_retryable(503));

        assert!(executor.execute(&Request::get("http://a")).await.is_ok());
        assert_eq!(executor.transport().calls(), 2);
    }

    #[tokio::test]
    async fn test_borrowed_transport() {
        let transport = ScriptedTransport::new([Ok(Response::new(429)), Ok(Response::new(204))]);

        let executor = RetryingExecutor::new(&transport).with_policy(fast(3));
        let response = executor.execute(&Request::get("http://a")).await.unwrap();

        assert_eq!(response.status, 204);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_hooks_see_attempt_index_and_cause() {
        let executor = RetryingExecutor::new(ScriptedTransport::new([
            Ok(Response::new(429)),
            Err(ScriptedError::new("reset")),
            Ok(Response::new(200)),
        ]))
        .with_policy(fast(3));

        let seen = std::sync::Mutex::new(Vec::new());
        executor
            .execute_with_hooks(&Request::get("http://a"), |event: &RetryEvent<'_, ScriptedError>| {
                seen.lock()
                    .unwrap()
                    .push((event.attempt, event.cause.status(), event.next_delay));
            })
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (0, Some(429), Duration::from_millis(1)),
                (1, None, Duration::from_millis(2)),
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_until_already_cancelled() {
        let executor = RetryingExecutor::new(ScriptedTransport::repeat(Ok(Response::new(200))));

        let err = executor
            .execute_until(&Request::get("http://a"), std::future::ready(()))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts, 0);
        assert_eq!(executor.transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_execute_until_never_cancelled() {
        let executor = RetryingExecutor::new(ScriptedTransport::new([Ok(Response::new(200))]));

        let response = executor
            .execute_until(&Request::get("http://a"), std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(response.status, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_attempts() {
        // default policy: first delay is at least one second
        let executor = RetryingExecutor::new(ScriptedTransport::repeat(Ok(Response::new(429))));

        let err = executor
            .execute_until(
                &Request::get("http://a"),
                tokio::time::sleep(Duration::from_millis(500)),
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts, 1);
        assert_eq!(executor.transport().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_transport_call() {
        let transport =
            ScriptedTransport::repeat(Ok(Response::new(200))).with_latency(Duration::from_secs(10));
        let executor = RetryingExecutor::new(transport);

        let err = executor
            .execute_until(
                &Request::get("http://a"),
                tokio::time::sleep(Duration::from_secs(1)),
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts, 1);
        assert_eq!(executor.transport().calls(), 1);
    }
}
