//! Testing utilities and helpers for persevere
//!
//! This module provides ergonomic utilities for testing code built on the
//! executor: a scripted transport that plays back canned outcomes, a recording
//! image slot, and assertion macros.
//!
//! # Examples
//!
//! ## ScriptedTransport
//!
//! ```rust
//! use persevere::testing::{ScriptedError, ScriptedTransport};
//! use persevere::{BackoffPolicy, Request, Response, RetryingExecutor};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let transport = ScriptedTransport::new([
//!     Err(ScriptedError::new("connection reset")),
//!     Ok(Response::new(200)),
//! ]);
//! let executor = RetryingExecutor::new(transport)
//!     .with_policy(BackoffPolicy::exponential(Duration::from_millis(1)).without_jitter());
//!
//! executor.execute(&Request::get("http://localhost")).await.unwrap();
//! assert_eq!(executor.transport().calls(), 2);
//! # });
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use persevere::{assert_failed_with_status, assert_succeeded};
//! use persevere::testing::ScriptedTransport;
//! use persevere::{Request, Response, RetryingExecutor};
//!
//! # tokio_test::block_on(async {
//! let ok = RetryingExecutor::new(ScriptedTransport::new([Ok(Response::new(200))]));
//! assert_succeeded!(ok.execute(&Request::get("http://localhost")).await);
//!
//! let not_found = RetryingExecutor::new(ScriptedTransport::new([Ok(Response::new(404))]));
//! assert_failed_with_status!(not_found.execute(&Request::get("http://localhost")).await, 404);
//! # });
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::request::{Request, Response};
use crate::transport::Transport;

/// Transport error produced by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedError {
    message: String,
}

impl ScriptedError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ScriptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ScriptedError {}

/// One scripted attempt outcome.
pub type Scripted = Result<Response, ScriptedError>;

/// A [`Transport`] that plays back a fixed script of outcomes.
///
/// Each call pops the next outcome. Once the script is exhausted the fallback
/// outcome (set by [`repeat`](Self::repeat) or [`then_repeat`](Self::then_repeat))
/// is returned on every call, or a `"script exhausted"` error if there is none.
/// Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Option<Scripted>,
    latency: Option<Duration>,
    requests: Mutex<Vec<Request>>,
    calls: AtomicU32,
}

impl ScriptedTransport {
    /// Play back `outcomes` in order.
    pub fn new(outcomes: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Return `outcome` on every call.
    pub fn repeat(outcome: Scripted) -> Self {
        Self::default().then_repeat(outcome)
    }

    /// Return `outcome` on every call after the script runs out.
    pub fn then_repeat(mut self, outcome: Scripted) -> Self {
        self.fallback = Some(outcome);
        self
    }

    /// Delay every outcome by `latency`, simulating a slow peer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_outcome(&self, request: &Request) -> Scripted {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let scripted = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());

        match (scripted, &self.fallback) {
            (Some(outcome), _) => outcome,
            (None, Some(fallback)) => fallback.clone(),
            (None, None) => Err(ScriptedError::new("script exhausted")),
        }
    }
}

impl Transport for ScriptedTransport {
    type Error = ScriptedError;

    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, Self::Error>> + Send {
        let outcome = self.next_outcome(request);
        let latency = self.latency;
        async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            outcome
        }
    }
}

#[cfg(feature = "imagen")]
pub use self::slot::{RecordingSlot, SlotEvent};

#[cfg(feature = "imagen")]
mod slot {
    use crate::imagen::{GeneratedImage, ImageSlot};

    /// What a [`RecordingSlot`] was asked to display.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SlotEvent {
        /// The loading indicator.
        Loading,
        /// An image, as its data URL and alt text.
        Image {
            /// `data:` URL of the image.
            data_url: String,
            /// Alt text.
            alt: String,
        },
        /// An error message.
        Error(String),
    }

    /// An [`ImageSlot`] that records every display call.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct RecordingSlot {
        /// Display calls, in order.
        pub events: Vec<SlotEvent>,
    }

    impl RecordingSlot {
        /// Create an empty slot.
        pub fn new() -> Self {
            Self::default()
        }

        /// The last thing displayed.
        pub fn current(&self) -> Option<&SlotEvent> {
            self.events.last()
        }
    }

    impl ImageSlot for RecordingSlot {
        fn show_loading(&mut self) {
            self.events.push(SlotEvent::Loading);
        }

        fn show_image(&mut self, image: &GeneratedImage) {
            self.events.push(SlotEvent::Image {
                data_url: image.data_url(),
                alt: image.alt().to_string(),
            });
        }

        fn show_error(&mut self, message: &str) {
            self.events.push(SlotEvent::Error(message.to_string()));
        }
    }
}

/// Assert that an execution succeeded.
///
/// This macro will panic if the result is an `Err`.
#[macro_export]
macro_rules! assert_succeeded {
    ($result:expr) => {
        match $result {
            Ok(_) => {}
            Err(e) => {
                panic!("Expected success, got failure: {:?}", e);
            }
        }
    };
}

/// Assert that an execution failed with the given final status.
///
/// This macro will panic if the result is an `Ok`, or if the failure carries a
/// different status or no status at all.
#[macro_export]
macro_rules! assert_failed_with_status {
    ($result:expr, $status:expr) => {
        match $result {
            Err(e) => {
                assert_eq!(
                    e.status(),
                    Some($status),
                    "Expected failure with status {}, got {:?}",
                    $status,
                    e
                );
            }
            Ok(response) => {
                panic!(
                    "Expected failure with status {}, got success: {:?}",
                    $status, response
                );
            }
        }
    };
}
