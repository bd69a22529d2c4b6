//! Shared retry configuration.
//!
//! The API client walks a deterministic exponential schedule between
//! rate-limited attempts; warehouse writes retry transient database errors
//! with a shorter, jittered schedule.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

/// First wait after a retryable API response.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;
/// Upper bound for a single backoff wait.
pub const MAX_BACKOFF_MS: u64 = 60_000;
/// Retries after the first request; a call makes at most `MAX_RETRIES + 1` requests.
pub const MAX_RETRIES: usize = 7;

/// Initial delay for transient warehouse write failures.
pub const WAREHOUSE_INITIAL_BACKOFF_MS: u64 = 100;
/// Retries for transient warehouse write failures.
pub const WAREHOUSE_MAX_RETRIES: usize = 3;

/// Configuration for retry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_RETRIES,
            with_jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: false,
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    ///
    /// Delays double from `min_delay` and are capped at `max_delay`.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }

    /// The per-retry delays this configuration produces, in order.
    ///
    /// The iterator is exhausted once the retry budget is spent.
    #[must_use]
    pub fn schedule(&self) -> ExponentialBackoff {
        self.clone().into_backoff().build()
    }
}

/// Backoff for transient warehouse errors (locked database, dropped connection).
#[must_use]
pub fn warehouse_backoff() -> ExponentialBuilder {
    RetryConfig::new(
        Duration::from_millis(WAREHOUSE_INITIAL_BACKOFF_MS),
        Duration::from_secs(5),
        WAREHOUSE_MAX_RETRIES,
    )
    .with_jitter(true)
    .into_backoff()
}
