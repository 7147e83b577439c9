//! The transport boundary and attempt classification.
//!
//! The executor is agnostic to the concrete protocol. It needs two things from
//! the outside world:
//!
//! - a [`Transport`] that performs one attempt and either yields a [`Response`]
//!   or fails at the transport level;
//! - a [`Classifier`] that decides whether a response is a success, a
//!   transient failure worth retrying, or a terminal one.
//!
//! Transport-level failures are always treated as transient.

use std::future::Future;
use std::sync::Arc;

use crate::request::{Request, Response};

/// Performs a single attempt of a request.
///
/// Implementations must not retry on their own; the executor owns the retry
/// loop. A per-attempt timeout, if any, belongs here and is reported as a
/// transport error.
///
/// # Examples
///
/// ```rust
/// use persevere::{Request, Response, Transport};
///
/// struct Echo;
///
/// impl Transport for Echo {
///     type Error = std::convert::Infallible;
///
///     async fn send(&self, request: &Request) -> Result<Response, Self::Error> {
///         Ok(Response::new(200).with_body(request.target.clone()))
///     }
/// }
/// ```
pub trait Transport {
    /// Transport-level failure, e.g. a connection or timeout error.
    type Error;

    /// Perform one attempt.
    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, Self::Error>> + Send;
}

impl<T: Transport + Sync> Transport for &T {
    type Error = T::Error;

    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, Self::Error>> + Send {
        (**self).send(request)
    }
}

impl<T: Transport + Send + Sync> Transport for Arc<T> {
    type Error = T::Error;

    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, Self::Error>> + Send {
        (**self).send(request)
    }
}

/// Outcome of a single attempt that reached the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Return the response to the caller.
    Success,
    /// Transient failure; retry if attempts remain.
    Retryable,
    /// Terminal failure; fail immediately.
    Fatal,
}

/// Decides what a response means for the retry loop.
pub trait Classifier {
    /// Classify one response.
    fn classify(&self, response: &Response) -> Verdict;
}

impl<F> Classifier for F
where
    F: Fn(&Response) -> Verdict,
{
    fn classify(&self, response: &Response) -> Verdict {
        self(response)
    }
}

/// Status-code based classification.
///
/// By default 2xx is a success, 429 is retryable and everything else is
/// fatal.
///
/// # Examples
///
/// ```rust
/// use persevere::{Classifier, Response, StatusClassifier, Verdict};
///
/// let classifier = StatusClassifier::default().with_retryable(503);
///
/// assert_eq!(classifier.classify(&Response::new(201)), Verdict::Success);
/// assert_eq!(classifier.classify(&Response::new(429)), Verdict::Retryable);
/// assert_eq!(classifier.classify(&Response::new(503)), Verdict::Retryable);
/// assert_eq!(classifier.classify(&Response::new(500)), Verdict::Fatal);
/// ```
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    success: fn(u16) -> bool,
    retryable: Vec<u16>,
}

/// Status code for "Too Many Requests".
pub const TOO_MANY_REQUESTS: u16 = 429;

fn is_2xx(status: u16) -> bool {
    (200..300).contains(&status)
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self {
            success: is_2xx,
            retryable: vec![TOO_MANY_REQUESTS],
        }
    }
}

impl StatusClassifier {
    /// Treat `status` as transient as well.
    pub fn with_retryable(mut self, status: u16) -> Self {
        if !self.retryable.contains(&status) {
            self.retryable.push(status);
        }
        self
    }

    /// Replace the success predicate.
    ///
    /// Success is checked before the retryable set.
    pub fn with_success(mut self, predicate: fn(u16) -> bool) -> Self {
        self.success = predicate;
        self
    }

    /// The statuses treated as transient.
    pub fn retryable(&self) -> &[u16] {
        &self.retryable
    }
}

impl Classifier for StatusClassifier {
    fn classify(&self, response: &Response) -> Verdict {
        if (self.success)(response.status) {
            Verdict::Success
        } else if self.retryable.contains(&response.status) {
            Verdict::Retryable
        } else {
            Verdict::Fatal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classification() {
        let classifier = StatusClassifier::default();

        assert_eq!(classifier.classify(&Response::new(200)), Verdict::Success);
        assert_eq!(classifier.classify(&Response::new(299)), Verdict::Success);
        assert_eq!(classifier.classify(&Response::new(429)), Verdict::Retryable);
        assert_eq!(classifier.classify(&Response::new(500)), Verdict::Fatal);
        assert_eq!(classifier.classify(&Response::new(503)), Verdict::Fatal);
        assert_eq!(classifier.classify(&Response::new(404)), Verdict::Fatal);
    }

    #[test]
    fn test_with_retryable_does_not_duplicate() {
        let classifier = StatusClassifier::default()
            .with_retryable(429)
            .with_retryable(503);

        assert_eq!(classifier.retryable(), &[429, 503]);
    }

    #[test]
    fn test_custom_success_predicate() {
        let classifier = StatusClassifier::default().with_success(|status| status == 304);

        assert_eq!(classifier.classify(&Response::new(304)), Verdict::Success);
        assert_eq!(classifier.classify(&Response::new(200)), Verdict::Fatal);
    }

    #[test]
    fn test_closure_classifier() {
        let classifier = |response: &Response| {
            if response.body.is_empty() {
                Verdict::Retryable
            } else {
                Verdict::Success
            }
        };

        assert_eq!(classifier.classify(&Response::new(200)), Verdict::Retryable);
        assert_eq!(
            classifier.classify(&Response::new(200).with_body("done")),
            Verdict::Success
        );
    }
}
