//! Per-model dispatch outcome

use domain::{ModelConfig, ModelId};
use serde::Serialize;

use crate::{
    error::{FailureKind, InferenceError},
    ports::{ChatCompletion, TokenUsage},
};

/// Why a dispatch failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    /// Error category
    pub kind: FailureKind,
    /// Human-readable message
    pub message: String,
}

impl From<&InferenceError> for DispatchFailure {
    fn from(err: &InferenceError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one model within a coordinator run
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    /// Model the call was made for
    pub model_id: ModelId,
    /// Provider tag of the model
    pub provider: String,
    /// Completion or failure
    pub outcome: Result<ChatCompletion, DispatchFailure>,
    /// Wall time spent on this model, retries included
    pub duration_ms: u64,
    /// Calls made to the backend (0 when the circuit was open)
    pub attempts: u32,
    /// Cost of the call when pricing and usage are known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl DispatchResult {
    /// Successful outcome, priced from the model's pricing table
    pub fn success(model: &ModelConfig, completion: ChatCompletion, duration_ms: u64, attempts: u32) -> Self {
        let cost = match (&model.pricing, completion.usage) {
            (Some(pricing), Some(usage)) => {
                Some(pricing.cost(usage.prompt_tokens, usage.completion_tokens))
            },
            _ => None,
        };
        Self {
            model_id: model.id.clone(),
            provider: model.provider.to_string(),
            outcome: Ok(completion),
            duration_ms,
            attempts,
            cost,
        }
    }

    /// Failed outcome
    pub fn failure(model: &ModelConfig, err: &InferenceError, duration_ms: u64, attempts: u32) -> Self {
        Self {
            model_id: model.id.clone(),
            provider: model.provider.to_string(),
            outcome: Err(DispatchFailure::from(err)),
            duration_ms,
            attempts,
            cost: None,
        }
    }

    /// Synthetic failure for a model whose breaker refused the call
    pub fn circuit_open(model: &ModelConfig) -> Self {
        Self {
            model_id: model.id.clone(),
            provider: model.provider.to_string(),
            outcome: Err(DispatchFailure {
                kind: FailureKind::CircuitOpen,
                message: "circuit open".to_string(),
            }),
            duration_ms: 0,
            attempts: 0,
            cost: None,
        }
    }

    /// Whether the model answered
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Generated content, when successful
    pub fn content(&self) -> Option<&str> {
        self.outcome.as_ref().ok().map(|c| c.content.as_str())
    }

    /// Token usage, when successful and reported
    pub fn usage(&self) -> Option<TokenUsage> {
        self.outcome.as_ref().ok().and_then(|c| c.usage)
    }

    /// Failure details, when failed
    pub fn failure_details(&self) -> Option<&DispatchFailure> {
        self.outcome.as_ref().err()
    }
}
