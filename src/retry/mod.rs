//! Backoff policies, retry events and terminal errors.
//!
//! This module holds the pure part of the retry machinery:
//!
//! - **Pure data**: [`BackoffPolicy`] describes the schedule and never sleeps,
//!   so it can be inspected and tested without a runtime
//! - **Observable**: every retry can be reported through a [`RetryEvent`] hook
//! - **Single failure shape**: callers only ever see [`RequestFailed`]
//!
//! The loop that consumes these lives in [`RetryingExecutor`](crate::RetryingExecutor).
//!
//! # Schedule
//!
//! The delay before retry `i` (0-based) is `2^i * base_unit + U[0, jitter_unit)`.
//! With the defaults (1s base, 1s jitter) that gives roughly 1-2s, 2-3s, 4-5s
//! and so on. The jitter spreads concurrent callers apart so they do not retry
//! in lockstep.
//!
//! ```rust
//! use persevere::BackoffPolicy;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::exponential(Duration::from_millis(250))
//!     .with_jitter(Duration::from_millis(100))
//!     .with_max_attempts(4);
//!
//! let delay = policy.delay_with_jitter(2).unwrap();
//! assert!(delay >= Duration::from_millis(1000));
//! assert!(delay < Duration::from_millis(1100));
//! ```

mod error;
mod event;
mod policy;

pub use error::{Cause, RequestFailed};
#[cfg(feature = "tracing")]
pub use event::trace_retry;
pub use event::RetryEvent;
pub use policy::{BackoffPolicy, DEFAULT_BASE_UNIT, DEFAULT_JITTER_UNIT, DEFAULT_MAX_ATTEMPTS};
