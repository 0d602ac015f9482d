//! Per-request options

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::InferenceError, resilience::RetryConfig};

/// How per-model results are folded into one logical response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// One response with an attributed section per successful model
    #[default]
    CombineAll,
    /// Content of the first successful model, in input order
    FirstSuccess,
    /// Content of the successful model that answered quickest
    Fastest,
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CombineAll => write!(f, "combine_all"),
            Self::FirstSuccess => write!(f, "first_success"),
            Self::Fastest => write!(f, "fastest"),
        }
    }
}

impl FromStr for AggregationStrategy {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "combine_all" | "combine" | "all" => Ok(Self::CombineAll),
            "first_success" | "first" => Ok(Self::FirstSuccess),
            "fastest" => Ok(Self::Fastest),
            other => Err(InferenceError::InvalidArgument(format!(
                "unknown aggregation strategy: {other}"
            ))),
        }
    }
}

/// Options applied to one logical request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Timeout for a single provider call in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Aggregation strategy for multi-model requests
    #[serde(default)]
    pub aggregation: AggregationStrategy,

    /// Upper bound on dispatches in flight at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Retry policy; `None` means a single attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// Whether circuit breakers gate dispatch
    #[serde(default = "default_true")]
    pub circuit_breaker_enabled: bool,

    /// Caller-supplied request identifier (generated when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Free-form metadata forwarded to the metrics sink
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

const fn default_timeout_ms() -> u64 {
    30_000
}

const fn default_max_concurrent_requests() -> usize {
    5
}

const fn default_true() -> bool {
    true
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            timeout_ms: default_timeout_ms(),
            aggregation: AggregationStrategy::default(),
            max_concurrent_requests: default_max_concurrent_requests(),
            retry: None,
            circuit_breaker_enabled: true,
            request_id: None,
            metadata: serde_json::Map::new(),
        }
    }
}

impl RequestOptions {
    /// Set temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set per-call timeout
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set aggregation strategy
    #[must_use]
    pub const fn with_aggregation(mut self, aggregation: AggregationStrategy) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Set the concurrency cap
    #[must_use]
    pub const fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    /// Enable retries with the given policy
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Toggle circuit breaking
    #[must_use]
    pub const fn with_circuit_breaker(mut self, enabled: bool) -> Self {
        self.circuit_breaker_enabled = enabled;
        self
    }

    /// Set the request identifier
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Add a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Reject options the coordinator cannot honour
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.max_concurrent_requests == 0 {
            return Err(InferenceError::InvalidArgument(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(InferenceError::InvalidArgument(
                "timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = RequestOptions::default();
        assert_eq!(options.timeout_ms, 30_000);
        assert_eq!(options.max_concurrent_requests, 5);
        assert_eq!(options.aggregation, AggregationStrategy::CombineAll);
        assert!(options.circuit_breaker_enabled);
        assert!(options.retry.is_none());
    }

    #[test]
    fn deserialization_with_defaults() {
        let options: RequestOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.max_concurrent_requests, 5);
        assert!(options.circuit_breaker_enabled);
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let options = RequestOptions::default().with_max_concurrent_requests(0);
        assert!(matches!(
            options.validate(),
            Err(InferenceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!(
            "combine_all".parse::<AggregationStrategy>().unwrap(),
            AggregationStrategy::CombineAll
        );
        assert_eq!(
            "FASTEST".parse::<AggregationStrategy>().unwrap(),
            AggregationStrategy::Fastest
        );
        assert!("vote".parse::<AggregationStrategy>().is_err());
    }

    #[test]
    fn builder_chaining() {
        let options = RequestOptions::default()
            .with_temperature(0.2)
            .with_max_tokens(64)
            .with_aggregation(AggregationStrategy::FirstSuccess)
            .with_metadata("session", "abc");
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.max_tokens, Some(64));
        assert_eq!(options.metadata.get("session").unwrap(), "abc");
    }
}
