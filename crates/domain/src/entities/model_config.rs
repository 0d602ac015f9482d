//! Resolved model configuration

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    errors::DomainError,
    value_objects::{ModelId, ProviderKind},
};

/// What a model can be asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ModelCapabilities {
    /// Supports chat completions
    #[serde(default = "default_true")]
    pub chat: bool,
    /// Supports streamed chat completions
    #[serde(default = "default_true")]
    pub stream: bool,
    /// Supports text embeddings
    #[serde(default)]
    pub embeddings: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            chat: true,
            stream: true,
            embeddings: false,
        }
    }
}

impl ModelCapabilities {
    /// Chat, streaming and embeddings
    pub const fn all() -> Self {
        Self {
            chat: true,
            stream: true,
            embeddings: true,
        }
    }

    /// Embeddings only
    pub const fn embeddings_only() -> Self {
        Self {
            chat: false,
            stream: false,
            embeddings: true,
        }
    }
}

/// Price per thousand tokens, in the caller's currency unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Cost per 1k prompt tokens
    pub prompt_per_1k: f64,
    /// Cost per 1k completion tokens
    pub completion_per_1k: f64,
}

impl ModelPricing {
    /// Create a pricing entry
    pub const fn new(prompt_per_1k: f64, completion_per_1k: f64) -> Self {
        Self {
            prompt_per_1k,
            completion_per_1k,
        }
    }

    /// Cost of a call with the given token counts
    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (f64::from(prompt_tokens) / 1000.0).mul_add(
            self.prompt_per_1k,
            f64::from(completion_tokens) / 1000.0 * self.completion_per_1k,
        )
    }
}

/// A model resolved by the registry: where it lives and what it can do
///
/// Immutable for the duration of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier
    pub id: ModelId,
    /// Backend family serving the model
    pub provider: ProviderKind,
    /// Endpoint override; falls back to provider-scoped configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,
    /// Capability set
    #[serde(default)]
    pub capabilities: ModelCapabilities,
    /// Token pricing used for cost aggregation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<ModelPricing>,
    /// Name the backend knows the model by (defaults to `id`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_model: Option<String>,
}

impl ModelConfig {
    /// Create a chat-capable model configuration
    pub fn new(id: impl Into<ModelId>, provider: ProviderKind) -> Self {
        Self {
            id: id.into(),
            provider,
            endpoint: None,
            credential_ref: None,
            capabilities: ModelCapabilities::default(),
            pricing: None,
            upstream_model: None,
        }
    }

    /// Create a local (Ollama-style) model configuration
    pub fn local(id: impl Into<ModelId>) -> Self {
        Self::new(id, ProviderKind::Local)
    }

    /// Create a remote (OpenAI-compatible) model configuration
    pub fn remote(id: impl Into<ModelId>, provider: &str) -> Self {
        Self::new(id, ProviderKind::parse(provider))
    }

    /// Override the endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the credential environment variable name
    #[must_use]
    pub fn with_credential_ref(mut self, credential_ref: impl Into<String>) -> Self {
        self.credential_ref = Some(credential_ref.into());
        self
    }

    /// Replace the capability set
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Attach pricing
    #[must_use]
    pub const fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Set the upstream model name
    #[must_use]
    pub fn with_upstream_model(mut self, name: impl Into<String>) -> Self {
        self.upstream_model = Some(name.into());
        self
    }

    /// Name sent to the backend
    pub fn upstream_name(&self) -> &str {
        self.upstream_model
            .as_deref()
            .unwrap_or_else(|| self.id.as_str())
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.is_empty() {
            return Err(DomainError::InvalidModelConfig(
                "model id must not be empty".to_string(),
            ));
        }
        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(DomainError::InvalidModelConfig(format!(
                    "model '{}' has a non-http endpoint: {endpoint}",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Validate a model set: non-empty, every entry valid, no duplicate ids
    pub fn validate_set(models: &[Self]) -> Result<(), DomainError> {
        if models.is_empty() {
            return Err(DomainError::ValidationError(
                "at least one model is required".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(models.len());
        for model in models {
            model.validate()?;
            if !seen.insert(model.id.as_str()) {
                return Err(DomainError::ValidationError(format!(
                    "duplicate model id: {}",
                    model.id
                )));
            }
        }
        Ok(())
    }
}
