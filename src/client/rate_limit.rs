//! Adaptive rate limiting for Vision One API calls
//!
//! A single sleep duration is shared by every call made through one client.
//! Each call first sleeps for that duration; a rate-limited outcome doubles
//! it and asks for the same call to be retried, any other outcome halves it.
//! Once the duration reaches its ceiling the limiter stops escalating and
//! hands the rate-limit error back to the caller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ErrorCode, Result};

/// Lower bound of the sleep duration
pub const MIN_SLEEP: Duration = Duration::from_micros(1);

/// Upper bound of the sleep duration
pub const MAX_SLEEP: Duration = Duration::from_secs(120);

/// Classifies an error as "rate limit surpassed"
pub type RateLimitPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// What the call loop should do after an outcome was checked
#[derive(Debug)]
pub enum Verdict {
    /// Repeat the same call
    Retry,
    /// Return this outcome to the caller
    Done(Result<()>),
}

/// Gate wrapped around every dispatch
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait before a call. Returns true if the caller must stop altogether.
    async fn should_abort(&self) -> bool;

    /// Feed back the outcome of the last call.
    fn check_error(&self, outcome: Result<()>) -> Verdict;
}

/// Vision One's own "too many requests" error, or a bare 429 from a gateway
pub fn is_too_many_requests(err: &Error) -> bool {
    match err {
        Error::Api(e) => e.code == ErrorCode::TooManyRequests || e.status == 429,
        Error::UnexpectedStatus { status, .. } => *status == 429,
        _ => false,
    }
}

/// Self-tuning limiter with geometric backoff and recovery
pub struct AdaptiveRateLimiter {
    sleep: Mutex<Duration>,
    min: Duration,
    max: Duration,
    rate_limited: Option<RateLimitPredicate>,
    stop: Option<CancellationToken>,
}

impl AdaptiveRateLimiter {
    /// Create a limiter with the default bounds.
    ///
    /// Without a predicate every outcome counts as "not rate limited", so the
    /// limiter only ever sleeps the minimum. Without a stop token
    /// [`should_abort`](RateLimiter::should_abort) never returns true.
    pub fn new(rate_limited: Option<RateLimitPredicate>, stop: Option<CancellationToken>) -> Self {
        Self::with_bounds(rate_limited, stop, MIN_SLEEP, MAX_SLEEP)
    }

    /// Limiter recognizing Vision One's `TooManyRequests` error.
    pub fn for_vision_one(stop: Option<CancellationToken>) -> Self {
        Self::new(Some(Arc::new(is_too_many_requests)), stop)
    }

    pub fn with_bounds(
        rate_limited: Option<RateLimitPredicate>,
        stop: Option<CancellationToken>,
        min: Duration,
        max: Duration,
    ) -> Self {
        let min = min.max(Duration::from_nanos(1));
        Self {
            sleep: Mutex::new(min),
            min,
            max: max.max(min),
            rate_limited,
            stop,
        }
    }

    /// Current sleep duration
    pub fn current_sleep(&self) -> Duration {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Duration> {
        // The guarded value is a plain Duration, a poisoned lock still holds a valid one
        self.sleep.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_rate_limited(&self, err: &Error) -> bool {
        self.rate_limited.as_ref().is_some_and(|p| p(err))
    }
}

#[async_trait]
impl RateLimiter for AdaptiveRateLimiter {
    async fn should_abort(&self) -> bool {
        let sleep = self.current_sleep();
        match &self.stop {
            None => {
                tokio::time::sleep(sleep).await;
                false
            }
            Some(stop) => {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => true,
                    _ = tokio::time::sleep(sleep) => false,
                }
            }
        }
    }

    fn check_error(&self, outcome: Result<()>) -> Verdict {
        let mut sleep = self.lock();

        let limited = match &outcome {
            Ok(()) => false,
            Err(err) => self.is_rate_limited(err),
        };

        if !limited {
            *sleep = (*sleep / 2).max(self.min);
            return Verdict::Done(outcome);
        }

        let doubled = sleep.saturating_mul(2);
        if doubled > self.max {
            *sleep = self.max;
            debug!("Rate limit persists at ceiling {:?}, giving up", self.max);
            return Verdict::Done(outcome);
        }
        *sleep = doubled;
        debug!("Rate limited, backing off to {:?}", doubled);
        Verdict::Retry
    }
}
