//! Resilience primitives for model dispatch
//!
//! - [`circuit_breaker`]: per-model failure gate
//! - [`retry`]: exponential backoff with jitter

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerSnapshot,
    CircuitState,
};
pub use retry::{RetryConfig, RetryHandler, RetryOutcome, Retryable};
