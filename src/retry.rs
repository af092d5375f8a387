//! Retry and backoff around remote calls.
//!
//! Every call to the remote API goes through [`FetchController::call`]. Each
//! attempt reports a [`FetchOutcome`]; the controller loops over attempts,
//! sleeping between them, until a success, an authentication failure, or
//! the attempt budget runs out.

use crate::config::{DelayConfig, RetryConfig};
use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a single remote call attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    /// The call succeeded.
    Success(T),
    /// The server throttled us, optionally saying how long to wait.
    RateLimited(Option<Duration>),
    /// The session was rejected. Never retried.
    Unauthorized(String),
    /// Any other failure.
    Failure(String),
}

impl<T> FetchOutcome<T> {
    /// Transform the success value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> FetchOutcome<U> {
        match self {
            Self::Success(v) => FetchOutcome::Success(f(v)),
            Self::RateLimited(d) => FetchOutcome::RateLimited(d),
            Self::Unauthorized(r) => FetchOutcome::Unauthorized(r),
            Self::Failure(r) => FetchOutcome::Failure(r),
        }
    }
}

/// Suspends the current task. Abstracted so tests can observe waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Records requested waits without sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every wait requested so far, in order.
    #[must_use]
    pub fn waits(&self) -> Vec<Duration> {
        self.waits
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
    }
}

/// Retry budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: usize,
    /// Delay after the first failed attempt; doubles after each further one.
    pub base_delay: Duration,
    /// Ceiling for computed delays. Server-provided delays are not capped.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: secs(config.base_delay_secs),
            max_delay: secs(config.max_delay_secs),
        }
    }

    /// `base_delay * 2^(attempt-1)`, capped at `max_delay`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exp = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = 2_u32.saturating_pow(exp);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// How long to wait after failed attempt number `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: usize, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.backoff_delay(attempt))
    }
}

/// Seconds from config as a [`Duration`], saturating where `validate` would
/// have refused the value.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// Uniformly sampled pause between two bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    #[must_use]
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Pause between handles.
    #[must_use]
    pub fn between_handles(config: &DelayConfig) -> Self {
        Self::new(
            secs(config.min_secs),
            secs(config.max_secs),
        )
    }

    /// Pause between pages of one tweet collection.
    #[must_use]
    pub fn between_pages(config: &DelayConfig) -> Self {
        Self::new(
            secs(config.page_min_secs),
            secs(config.page_max_secs),
        )
    }

    #[must_use]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

/// Applies a [`RetryPolicy`] to remote calls.
#[derive(Clone)]
pub struct FetchController {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for FetchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchController")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl FetchController {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `operation` names the call in logs and in the exhaustion error.
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::Auth` as soon as an attempt is unauthorized, and
    /// `ScrapeError::FetchExhausted` once `max_attempts` attempts have failed.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchOutcome<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            debug!(operation, attempt, "Dispatching remote call");

            let retry_after = match op().await {
                FetchOutcome::Success(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Remote call recovered");
                    }
                    return Ok(value);
                }
                FetchOutcome::Unauthorized(reason) => {
                    return Err(ScrapeError::auth(format!("{operation}: {reason}")));
                }
                FetchOutcome::RateLimited(retry_after) => {
                    last_reason = ScrapeError::RateLimited { retry_after }.to_string();
                    Some(retry_after)
                }
                FetchOutcome::Failure(reason) => {
                    last_reason = reason;
                    None
                }
            };

            if attempt == max_attempts {
                break;
            }

            let delay = self.policy.delay_for(attempt, retry_after.flatten());
            if retry_after.is_some() {
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    "Rate limit exceeded, waiting before retry"
                );
            } else {
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    reason = %last_reason,
                    "Remote call failed, retrying"
                );
            }
            self.sleeper.sleep(delay).await;
        }

        Err(ScrapeError::fetch_exhausted(
            operation,
            max_attempts,
            last_reason,
        ))
    }
}
