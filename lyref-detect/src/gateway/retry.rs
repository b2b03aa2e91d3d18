//! Bounded retry with exponential backoff
//!
//! Delay after failed attempt `n` (1-based) is
//! `clamp(multiplier * 2^n, min_delay, max_delay)` time units. With the
//! defaults (1.0, 2, 10) that is 2, 4, 8, 10, ... seconds. No delay follows
//! the final attempt.

use lyref_common::config::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt ceiling reached; carries the last failure
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: E,
}

/// Retry schedule shared by every model call in a run
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub multiplier: f64,
    /// Floor, in units
    pub min_delay: f64,
    /// Ceiling, in units
    pub max_delay: f64,
    /// Length of one time unit
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            multiplier: config.multiplier,
            min_delay: config.min_delay_secs,
            max_delay: config.max_delay_secs,
            unit: Duration::from_secs(1),
        }
    }

    /// Same schedule with a different time unit
    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Wait before attempt `attempt + 1`
    ///
    /// Never panics: a NaN bound is ignored, a negative or NaN result waits
    /// zero and an overflowing one waits [`Duration::MAX`].
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.min(i32::MAX as u32) as i32);
        // f64::max/min return the other operand when one side is NaN
        let units = (self.multiplier * exp).max(self.min_delay).min(self.max_delay);
        if units.is_nan() || units <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.unit.as_secs_f64() * units).unwrap_or(Duration::MAX)
    }

    /// Drive `operation` until it succeeds or the attempt ceiling is reached
    ///
    /// `operation` receives the 1-based attempt number. Every error is
    /// treated as retryable.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, Exhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= self.max_attempts => {
                    return Err(Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
