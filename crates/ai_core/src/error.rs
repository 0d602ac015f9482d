//! Inference errors

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to a model backend
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Endpoint or credential missing for a provider; raised before any I/O
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failed to connect to inference server
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request to inference server failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Model not found or not loaded
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Response parsing failed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Timeout during inference
    #[error("Inference timeout after {0}ms")]
    Timeout(u64),

    /// Rate limit exceeded
    #[error("Rate limit exceeded (HTTP 429): {0}")]
    RateLimited(String),

    /// Server error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// A single stream line could not be decoded
    #[error("Stream decode error: {0}")]
    StreamDecode(String),

    /// The circuit breaker for the model is open
    #[error("Circuit open for model '{0}'")]
    CircuitOpen(String),

    /// The backend lacks the requested capability
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Caller supplied unusable input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The response-persistence hook failed
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Coarse error category carried by failed dispatch results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing provider configuration
    Configuration,
    /// Transport, status or payload failure
    Provider,
    /// Synthetic failure, no network call made
    CircuitOpen,
    /// Per-call timeout expired
    Timeout,
    /// Undecodable stream line
    StreamDecode,
    /// Capability not offered by the backend
    NotSupported,
    /// Bad caller input
    InvalidArgument,
    /// Response-persistence hook failure
    Persistence,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Provider => "provider",
            Self::CircuitOpen => "circuit_open",
            Self::Timeout => "timeout",
            Self::StreamDecode => "stream_decode",
            Self::NotSupported => "not_supported",
            Self::InvalidArgument => "invalid_argument",
            Self::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

impl InferenceError {
    /// Category of this error
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Configuration(_) => FailureKind::Configuration,
            Self::ConnectionFailed(_)
            | Self::RequestFailed(_)
            | Self::ModelNotAvailable(_)
            | Self::InvalidResponse(_)
            | Self::RateLimited(_)
            | Self::ServerError { .. } => FailureKind::Provider,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::StreamDecode(_) => FailureKind::StreamDecode,
            Self::CircuitOpen(_) => FailureKind::CircuitOpen,
            Self::NotSupported(_) => FailureKind::NotSupported,
            Self::InvalidArgument(_) => FailureKind::InvalidArgument,
            Self::Persistence(_) => FailureKind::Persistence,
        }
    }

    /// Whether the failure happened locally, without involving the backend
    ///
    /// Local failures never count against a model's circuit breaker.
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::NotSupported(_) | Self::InvalidArgument(_)
        )
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let body = body.trim();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited(body.to_string())
        } else if status.is_server_error() {
            Self::ServerError {
                status: status.as_u16(),
                message: body.to_string(),
            }
        } else {
            Self::RequestFailed(format!("HTTP {}: {body}", status.as_u16()))
        }
    }

    /// Map a transport error, recording the configured timeout
    pub fn from_transport(err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_ms)
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::RequestFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_maps_to_rate_limited() {
        let err = InferenceError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, InferenceError::RateLimited(_)));
        assert_eq!(err.kind(), FailureKind::Provider);
    }

    #[test]
    fn status_503_maps_to_server_error() {
        let err = InferenceError::from_status(reqwest::StatusCode::SERVICE_UNAVAILABLE, "");
        match err {
            InferenceError::ServerError { status, .. } => assert_eq!(status, 503),
            other => unreachable!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn status_400_maps_to_request_failed() {
        let err = InferenceError::from_status(reqwest::StatusCode::BAD_REQUEST, "bad");
        assert_eq!(err.to_string(), "Request failed: HTTP 400: bad");
    }

    #[test]
    fn local_errors() {
        assert!(InferenceError::Configuration("x".into()).is_local());
        assert!(InferenceError::NotSupported("x".into()).is_local());
        assert!(!InferenceError::Timeout(10).is_local());
        assert!(!InferenceError::CircuitOpen("m".into()).is_local());
    }

    #[test]
    fn failure_kind_display_matches_serde() {
        let json = serde_json::to_string(&FailureKind::CircuitOpen).unwrap();
        assert_eq!(json, format!("\"{}\"", FailureKind::CircuitOpen));
    }

    #[test]
    fn timeout_message() {
        assert_eq!(
            InferenceError::Timeout(30000).to_string(),
            "Inference timeout after 30000ms"
        );
    }
}
