//! Exponential backoff retry logic for storage operations.
//!
//! Transient storage errors (connection loss, deadlocks, pool timeouts) are
//! retried with bounded exponential backoff. Permanent errors and foreign-key
//! violations are returned immediately - retrying them would fail the same
//! way.

use std::future::Future;
use std::time::Duration;

use super::error::{StoreError, StoreErrorKind};

/// Configuration for exponential backoff retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,

    /// Initial delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (cap for exponential growth).
    pub max_delay: Duration,

    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Default retry configuration for blip commits.
    ///
    /// - 5 retries with 500ms, 1s, 2s, 4s, 8s delays
    /// - Total max wait: ~15.5 seconds, short enough that the pipeline's
    ///   ordering guarantee does not stall the stream for long
    pub const DEFAULT: Self = Self {
        max_retries: 5,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(8),
        backoff_multiplier: 2.0,
    };

    /// Creates a new retry configuration.
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Computes the delay for the given retry attempt (0-indexed).
    ///
    /// The delay grows exponentially, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped_secs)
    }

    /// Returns an iterator over all retry delays.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|attempt| self.delay_for_attempt(attempt))
    }

    /// Computes the total maximum wait time for all retries.
    pub fn total_max_wait(&self) -> Duration {
        self.delays().sum()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Result of a retried storage operation.
#[derive(Debug)]
pub enum RetryResult<T> {
    /// The operation succeeded.
    Success(T),

    /// A transient error persisted through all retries.
    ExhaustedRetries {
        /// The last error encountered.
        last_error: StoreError,
        /// Number of attempts made (including the initial attempt).
        attempts: u32,
    },

    /// A permanent error occurred (not retriable).
    PermanentError(StoreError),

    /// A foreign-key violation (skip the blip set, do not retry).
    ForeignKeyViolation(StoreError),
}

impl<T> RetryResult<T> {
    /// Returns true if the result is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }
}

/// Executes an async storage operation with retry logic.
///
/// The operation is re-run from scratch on each attempt; commit idempotency
/// (ON CONFLICT DO NOTHING on the natural key) makes re-running a partially
/// applied transaction safe.
pub async fn retry_with_backoff<T, F, Fut>(config: RetryConfig, mut operation: F) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    let max_attempts = config.max_retries + 1; // Include initial attempt

    loop {
        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) => {
                attempt += 1;

                match e.kind {
                    StoreErrorKind::Permanent | StoreErrorKind::Exhausted => {
                        return RetryResult::PermanentError(e);
                    }
                    StoreErrorKind::ForeignKey => return RetryResult::ForeignKeyViolation(e),
                    StoreErrorKind::Transient => {
                        if attempt >= max_attempts {
                            return RetryResult::ExhaustedRetries {
                                last_error: e,
                                attempts: attempt,
                            };
                        }

                        let delay = config.delay_for_attempt(attempt - 1);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}
