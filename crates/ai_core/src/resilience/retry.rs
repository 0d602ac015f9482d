//! Retry with exponential backoff
//!
//! Wraps one provider call with a bounded number of attempts. Only errors
//! classified transient are retried; the delay between attempts is a tokio
//! timer so other dispatches on the same task keep making progress.
//!
//! # Example
//!
//! ```rust,ignore
//! use ai_core::resilience::{RetryConfig, RetryHandler};
//!
//! let handler = RetryHandler::new(RetryConfig::default());
//! let outcome = handler.run(|| async { adapter.chat_completions(&messages, &options).await }).await;
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::InferenceError;

/// Configuration for retry behavior with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of tries, including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds (default: 1000ms)
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Maximum delay between attempts in milliseconds (default: 30000ms)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Whether to add jitter to prevent thundering herd (default: true)
    #[serde(default = "default_true")]
    pub jitter_enabled: bool,

    /// Jitter factor (0.0 to 1.0, default: 0.25 = ±25%)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay() -> u64 {
    1000
}

const fn default_max_delay() -> u64 {
    30_000
}

const fn default_true() -> bool {
    true
}

const fn default_jitter_factor() -> f64 {
    0.25
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter_enabled: default_true(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with custom parameters
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            jitter_enabled: true,
            jitter_factor: 0.25,
        }
    }

    /// Configuration for tests and latency-sensitive paths
    #[must_use]
    pub const fn fast() -> Self {
        Self::new(3, 10, 100)
    }

    /// Disable jitter (deterministic delays)
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter_enabled = false;
        self
    }

    /// Reject unusable settings
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.max_attempts == 0 {
            return Err(InferenceError::InvalidArgument(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.jitter_factor) {
            return Err(InferenceError::InvalidArgument(format!(
                "retry jitter_factor must be in [0, 1), got {}",
                self.jitter_factor
            )));
        }
        Ok(())
    }

    /// Delay before the given retry (1 = first retry)
    ///
    /// `base_delay * 2^(retry-1)`, jittered within ±`jitter_factor`, capped
    /// at `max_delay`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation
    )]
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(32);
        let nominal = self.base_delay_ms.saturating_mul(1u64 << exponent) as f64;

        let jittered = if self.jitter_enabled && self.jitter_factor > 0.0 {
            let range = nominal * self.jitter_factor;
            nominal + rand::rng().random_range(-range..=range)
        } else {
            nominal
        };

        let capped = jittered.clamp(0.0, self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Trait for errors that can be checked for retryability
pub trait Retryable {
    /// Returns true if this error is retryable
    fn is_retryable(&self) -> bool;
}

/// Signatures that mark an error as transient
const TRANSIENT_SIGNATURES: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "rate limit",
    "429",
    "502",
    "503",
    "504",
];

impl Retryable for InferenceError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Configuration(_)
            | Self::NotSupported(_)
            | Self::InvalidArgument(_)
            | Self::CircuitOpen(_) => false,
            _ => {
                let haystack = format!("{} {self}", self.kind()).to_lowercase();
                TRANSIENT_SIGNATURES
                    .iter()
                    .any(|signature| haystack.contains(signature))
            },
        }
    }
}

/// Retry result containing either success or the last error
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// The result of the operation
    pub result: Result<T, E>,
    /// Number of attempts made (1 = no retries, 2 = one retry, etc.)
    pub attempts: u32,
    /// Total time spent including retries
    pub total_duration: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    /// Check if the operation succeeded
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Convert to standard Result, discarding metadata
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Backoff-and-retry wrapper for one logical call
#[derive(Debug, Clone, Default)]
pub struct RetryHandler {
    config: RetryConfig,
}

impl RetryHandler {
    /// Create a handler with the given policy
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The policy in use
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds, fails permanently or attempts run out
    #[allow(clippy::cast_possible_truncation)]
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let start = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            match operation().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(
                            attempts = attempts,
                            duration_ms = start.elapsed().as_millis() as u64,
                            "Operation succeeded after retries"
                        );
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                        total_duration: start.elapsed(),
                    };
                },
                Err(err) => {
                    if !err.is_retryable() {
                        debug!(
                            attempts = attempts,
                            error = %err,
                            "Operation failed with non-retryable error"
                        );
                        return RetryOutcome {
                            result: Err(err),
                            attempts,
                            total_duration: start.elapsed(),
                        };
                    }

                    if attempts >= max_attempts {
                        warn!(
                            attempts = attempts,
                            max_attempts = max_attempts,
                            error = %err,
                            "Operation failed after max attempts"
                        );
                        return RetryOutcome {
                            result: Err(err),
                            attempts,
                            total_duration: start.elapsed(),
                        };
                    }

                    let delay = self.config.delay_before_retry(attempts);
                    warn!(
                        attempt = attempts,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Operation failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                },
            }
        }
    }
}
