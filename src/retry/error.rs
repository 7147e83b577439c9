//! Error types for retried requests.

use std::fmt;
use std::time::Duration;

use crate::request::Response;

/// Why an attempt, or a whole call, failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause<E> {
    /// The peer answered with a status the classifier did not accept.
    Status(Response),
    /// The transport could not complete the call.
    Transport(E),
    /// The caller cancelled the call before it resolved.
    Cancelled,
}

impl<E> Cause<E> {
    /// The status code, for status causes.
    pub fn status(&self) -> Option<u16> {
        match self {
            Cause::Status(response) => Some(response.status),
            _ => None,
        }
    }

    /// True for transport-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, Cause::Transport(_))
    }
}

impl<E: fmt::Display> fmt::Display for Cause<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Status(response) => {
                write!(f, "API request failed with status {}", response.status)
            }
            Cause::Transport(e) => write!(f, "transport error: {}", e),
            Cause::Cancelled => f.write_str("request cancelled"),
        }
    }
}

/// Terminal failure of a retried request.
///
/// Carries the last observed cause along with metadata about the attempts.
/// Transient failures that were retried successfully never surface here.
///
/// # Examples
///
/// ```rust
/// use persevere::{testing::ScriptedTransport, Request, Response, RetryingExecutor};
///
/// # tokio_test::block_on(async {
/// let transport = ScriptedTransport::new([Ok(Response::new(500))]);
/// let executor = RetryingExecutor::new(transport);
///
/// let err = executor.execute(&Request::get("http://localhost")).await.unwrap_err();
/// assert_eq!(err.status(), Some(500));
/// assert_eq!(err.attempts, 1);
/// assert_eq!(err.to_string(), "API request failed with status 500");
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailed<E> {
    /// The cause observed on the final attempt.
    pub cause: Cause<E>,
    /// Number of transport calls made.
    pub attempts: u32,
    /// Time between the first attempt and the failure.
    pub total_duration: Duration,
}

impl<E> RequestFailed<E> {
    /// Create a new RequestFailed error.
    pub fn new(cause: Cause<E>, attempts: u32, total_duration: Duration) -> Self {
        Self {
            cause,
            attempts,
            total_duration,
        }
    }

    /// The final status code, if the last attempt got a response.
    pub fn status(&self) -> Option<u16> {
        self.cause.status()
    }

    /// The final response, if the last attempt got one.
    pub fn response(&self) -> Option<&Response> {
        match &self.cause {
            Cause::Status(response) => Some(response),
            _ => None,
        }
    }

    /// The transport error, if the last attempt failed at the transport level.
    pub fn transport_error(&self) -> Option<&E> {
        match &self.cause {
            Cause::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// True if the caller cancelled the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, Cause::Cancelled)
    }

    /// Extract the cause, discarding metadata.
    pub fn into_cause(self) -> Cause<E> {
        self.cause
    }
}

impl<E: fmt::Display> fmt::Display for RequestFailed<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Cause::Status(_) => write!(f, "{}", self.cause),
            Cause::Transport(_) => write!(
                f,
                "request failed after {} attempts ({:?}): {}",
                self.attempts, self.total_duration, self.cause
            ),
            Cause::Cancelled => write!(f, "request cancelled after {} attempts", self.attempts),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RequestFailed<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            Cause::Transport(e) => Some(e),
            _ => None,
        }
    }
}
