//! Provider-scoped configuration
//!
//! Endpoints and credentials are stored per provider kind (`"ollama"`,
//! `"openai"`, `"groq"`, ...) and resolved lazily, on the first call made
//! through an adapter. A missing entry is a [`InferenceError::Configuration`]
//! raised before any network I/O.

use std::collections::HashMap;

use domain::ModelConfig;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// Endpoint and credential for one provider kind
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Base URL of the provider API (e.g. `https://api.openai.com/v1`)
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key (sensitive - uses `SecretString`)
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Environment variable holding the API key, read on first use
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_key_env", &self.api_key_env)
            .finish()
    }
}

impl ProviderSettings {
    /// Settings with only a base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// Attach an inline API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Read the API key from an environment variable on first use
    #[must_use]
    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }
}

/// Provider settings keyed by provider kind name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvidersConfig {
    entries: HashMap<String, ProviderSettings>,
}

/// Endpoint and credential resolved for one call
#[derive(Clone)]
pub struct ResolvedEndpoint {
    /// Base URL without a trailing slash
    pub base_url: String,
    /// Credential, when the provider needs one
    pub credential: Option<SecretString>,
}

impl std::fmt::Debug for ResolvedEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedEndpoint")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ProvidersConfig {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the settings for a provider kind
    #[must_use]
    pub fn with_provider(mut self, key: impl Into<String>, settings: ProviderSettings) -> Self {
        self.entries.insert(key.into().to_lowercase(), settings);
        self
    }

    /// Settings for a provider kind, if configured
    pub fn get(&self, key: &str) -> Option<&ProviderSettings> {
        self.entries.get(&key.to_lowercase())
    }

    /// Configured provider names
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolve endpoint (and, if required, credential) for a model
    ///
    /// The model's own `endpoint` and `credential_ref` take precedence over
    /// the provider-scoped entry.
    pub fn resolve(
        &self,
        model: &ModelConfig,
        require_credential: bool,
    ) -> Result<ResolvedEndpoint, InferenceError> {
        let key = model.provider.config_key();
        let settings = self.get(key);

        let base_url = model
            .endpoint
            .as_deref()
            .or_else(|| settings.and_then(|s| s.base_url.as_deref()))
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                InferenceError::Configuration(format!(
                    "no endpoint configured for provider '{key}' (model '{}')",
                    model.id
                ))
            })?;

        let credential = Self::resolve_credential(model, settings)?;
        if require_credential && credential.is_none() {
            return Err(InferenceError::Configuration(format!(
                "no credential configured for provider '{key}' (model '{}')",
                model.id
            )));
        }

        Ok(ResolvedEndpoint {
            base_url,
            credential,
        })
    }

    fn resolve_credential(
        model: &ModelConfig,
        settings: Option<&ProviderSettings>,
    ) -> Result<Option<SecretString>, InferenceError> {
        if let Some(var) = &model.credential_ref {
            return read_env(var).map(Some).ok_or_else(|| {
                InferenceError::Configuration(format!(
                    "credential variable '{var}' for model '{}' is not set",
                    model.id
                ))
            });
        }

        let Some(settings) = settings else {
            return Ok(None);
        };
        if let Some(key) = &settings.api_key {
            return Ok(Some(key.clone()));
        }
        Ok(settings.api_key_env.as_deref().and_then(read_env))
    }
}

fn read_env(var: &str) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}
