//! # Persevere
//!
//! > *"Try, wait a little longer, try again"*
//!
//! A Rust library for executing network requests that survive transient
//! failure.
//!
//! ## Philosophy
//!
//! **Persevere** keeps the retry loop small and the policy pure:
//! - **Policy** = Data (a [`BackoffPolicy`] describes the schedule, it never sleeps)
//! - **Executor** = Loop (a [`RetryingExecutor`] owns the attempts and delays)
//! - **Transport** = Capability (a [`Transport`] performs one attempt and nothing else)
//!
//! Transient failures (HTTP 429 and transport errors by default) are retried
//! with capped exponential backoff plus jitter. Anything else fails at once.
//! Callers only ever see the successful response or a single
//! [`RequestFailed`].
//!
//! ## Quick Example
//!
//! ```rust
//! use persevere::testing::ScriptedTransport;
//! use persevere::{BackoffPolicy, Request, Response, RetryingExecutor};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! // A peer that rate-limits twice before answering
//! let transport = ScriptedTransport::new([
//!     Ok(Response::new(429)),
//!     Ok(Response::new(429)),
//!     Ok(Response::new(200).with_body("hello")),
//! ]);
//!
//! let executor = RetryingExecutor::new(transport)
//!     .with_policy(
//!         BackoffPolicy::exponential(Duration::from_millis(5))
//!             .with_jitter(Duration::from_millis(5))
//!             .with_max_attempts(3),
//!     );
//!
//! match executor.execute(&Request::get("https://example.com")).await {
//!     Ok(response) => assert_eq!(response.text(), "hello"),
//!     Err(failed) => panic!("{}", failed),
//! }
//! # });
//! ```
//!
//! ## Features
//!
//! - `imagen` (default): the `imagen` text-to-image client
//! - `tracing` (default): `tracing` events for retries and image failures
//! - `http`: `http::HttpTransport` over `reqwest`
//! - `serde`: `Serialize`/`Deserialize` for [`BackoffPolicy`]

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod executor;
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "imagen")]
pub mod imagen;
pub mod request;
pub mod retry;
pub mod testing;
pub mod transport;

// Re-exports
pub use executor::RetryingExecutor;
pub use request::{Method, Request, Response};
pub use retry::{BackoffPolicy, Cause, RequestFailed, RetryEvent};
pub use transport::{Classifier, StatusClassifier, Transport, Verdict};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::executor::RetryingExecutor;
    pub use crate::request::{Method, Request, Response};
    pub use crate::retry::{BackoffPolicy, Cause, RequestFailed, RetryEvent};
    pub use crate::transport::{Classifier, StatusClassifier, Transport, Verdict};
}
