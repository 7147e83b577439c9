//! Backoff policy types and configuration.

use std::time::Duration;

use rand::Rng;

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base unit of the exponential schedule.
pub const DEFAULT_BASE_UNIT: Duration = Duration::from_millis(1000);

/// Default upper bound (exclusive) of the random jitter.
pub const DEFAULT_JITTER_UNIT: Duration = Duration::from_millis(1000);

/// A backoff policy describing how often and how patiently to retry.
///
/// Policies are pure data: they describe the schedule but never sleep. The
/// delay before retry `i` (0-based) is
///
/// ```text
/// min(2^i * base_unit, max_delay) + uniform[0, jitter_unit)
/// ```
///
/// where `max_delay` is unset by default.
///
/// `max_attempts` counts every transport call, the first one included. A
/// policy with `max_attempts == 3` performs at most two retries.
///
/// # Examples
///
/// ```rust
/// use persevere::BackoffPolicy;
/// use std::time::Duration;
///
/// let policy = BackoffPolicy::default();
///
/// assert_eq!(policy.max_attempts(), 3);
/// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_secs(1)));
/// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_secs(2)));
/// assert_eq!(policy.delay_for_attempt(2), None); // last attempt, no retry
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackoffPolicy {
    max_attempts: u32,
    base_unit: Duration,
    jitter_unit: Duration,
    max_delay: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::exponential(DEFAULT_BASE_UNIT)
    }
}

impl BackoffPolicy {
    /// Create an exponential policy with the given base unit, the default
    /// attempt bound and the default jitter.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persevere::BackoffPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = BackoffPolicy::exponential(Duration::from_millis(100))
    ///     .with_max_attempts(5);
    ///
    /// // Delay doubles: 100ms, 200ms, 400ms, 800ms
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(100)));
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(200)));
    /// assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(800)));
    /// assert_eq!(policy.delay_for_attempt(4), None);
    /// ```
    pub fn exponential(base_unit: Duration) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_unit,
            jitter_unit: DEFAULT_JITTER_UNIT,
            max_delay: None,
        }
    }

    /// Set the maximum number of attempts, the first one included.
    ///
    /// A value of zero is treated as one: a call always makes at least one
    /// attempt.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persevere::BackoffPolicy;
    ///
    /// assert_eq!(BackoffPolicy::default().with_max_attempts(5).max_attempts(), 5);
    /// assert_eq!(BackoffPolicy::default().with_max_attempts(0).max_attempts(), 1);
    /// ```
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Set the exclusive upper bound of the random jitter added to each delay.
    pub fn with_jitter(mut self, jitter_unit: Duration) -> Self {
        self.jitter_unit = jitter_unit;
        self
    }

    /// Disable jitter; delays become exactly the exponential schedule.
    pub fn without_jitter(self) -> Self {
        self.with_jitter(Duration::ZERO)
    }

    /// Cap the exponential term of every delay.
    ///
    /// Jitter is added after the cap, so a capped delay still lands in
    /// `[max_delay, max_delay + jitter_unit)`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persevere::BackoffPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = BackoffPolicy::exponential(Duration::from_millis(100))
    ///     .with_max_attempts(10)
    ///     .with_max_delay(Duration::from_millis(500));
    ///
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(400)));
    /// assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(500)));
    /// ```
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Get the maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Get the base unit of the exponential schedule.
    pub fn base_unit(&self) -> Duration {
        self.base_unit
    }

    /// Get the jitter bound.
    pub fn jitter_unit(&self) -> Duration {
        self.jitter_unit
    }

    /// Get the cap on the exponential term.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// True if attempt `attempt` (0-based) may be followed by another one.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_attempts()
    }

    /// Calculate the un-jittered delay before retry `attempt` (0-indexed).
    ///
    /// Returns `None` when `attempt` is the last allowed attempt, in which case
    /// no retry follows.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if !self.allows_retry_after(attempt) {
            return None;
        }

        let delay = self
            .base_unit
            .saturating_mul(2u32.saturating_pow(attempt));

        Some(match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        })
    }

    /// Calculate the jittered delay before retry `attempt`, drawing the jitter
    /// from `rng`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persevere::BackoffPolicy;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// use std::time::Duration;
    ///
    /// let policy = BackoffPolicy::default();
    /// let mut rng = StdRng::seed_from_u64(7);
    ///
    /// let delay = policy.delay_with_rng(1, &mut rng).unwrap();
    /// assert!(delay >= Duration::from_secs(2));
    /// assert!(delay < Duration::from_secs(3));
    /// ```
    pub fn delay_with_rng<R: Rng>(&self, attempt: u32, rng: &mut R) -> Option<Duration> {
        let base = self.delay_for_attempt(attempt)?;
        Some(base.saturating_add(self.jitter(rng)))
    }

    /// Calculate the jittered delay before retry `attempt` using the thread
    /// local RNG.
    ///
    /// This is used by the executor.
    pub fn delay_with_jitter(&self, attempt: u32) -> Option<Duration> {
        self.delay_with_rng(attempt, &mut rand::rng())
    }

    fn jitter<R: Rng>(&self, rng: &mut R) -> Duration {
        let bound = u64::try_from(self.jitter_unit.as_nanos()).unwrap_or(u64::MAX);
        if bound == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(rng.random_range(0..bound))
        }
    }
}
