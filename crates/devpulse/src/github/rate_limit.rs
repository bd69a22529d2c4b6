//! Quota tracking and request pacing.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::http::HttpResponse;

/// Remaining quota below which the client pauses until the window resets.
pub const RATE_LIMIT_THRESHOLD: u64 = 100;

/// Default pacing: GitHub allows 5000 requests/hour, bursts are fine.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Quota headers from a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: u64,
    /// Epoch seconds at which the quota window resets.
    pub reset_epoch: i64,
}

impl RateLimitInfo {
    /// Read `X-RateLimit-Remaining` and `X-RateLimit-Reset`.
    ///
    /// Returns `None` when either header is missing or not a number.
    pub fn from_response(response: &HttpResponse) -> Option<Self> {
        let remaining = response
            .header("x-ratelimit-remaining")
            .and_then(|v| v.trim().parse::<u64>().ok())?;
        let reset_epoch = response
            .header("x-ratelimit-reset")
            .and_then(|v| v.trim().parse::<i64>().ok())?;
        Some(Self {
            remaining,
            reset_epoch,
        })
    }

    #[must_use]
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.reset_epoch, 0)
    }

    /// How long to pause before the next request, if quota is low.
    ///
    /// Waits until one second past the reset instant, never less than one second.
    #[must_use]
    pub fn throttle_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.remaining >= RATE_LIMIT_THRESHOLD {
            return None;
        }
        let secs = (self.reset_epoch - now.timestamp() + 1).max(1);
        Some(Duration::from_secs(secs as u64))
    }
}

/// Client-side request pacing backed by governor.
///
/// Independent of the quota headers; keeps bursts from a concurrent run
/// under a fixed rate.
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// `requests_per_second` of zero is treated as one.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        }
    }

    /// Wait until a request is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}
