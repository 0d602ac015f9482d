//! Ollama-style local backend adapter

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use domain::{ConversationMessage, ModelConfig, ModelId, ProviderKind};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::ProvidersConfig,
    error::InferenceError,
    http::{PROBE_TIMEOUT, WireMessage, ensure_success, wire_messages},
    options::RequestOptions,
    ports::{
        ChatCompletion, DeltaStream, EmbeddingResponse, ProviderAdapter, ResponsePersistence,
        TokenUsage,
    },
    streaming::{StreamRelay, WireFormat},
};

/// Adapter for a locally hosted Ollama-compatible server
pub struct LocalProvider {
    model: ModelConfig,
    providers: Arc<ProvidersConfig>,
    client: Client,
    persistence: Option<Arc<dyn ResponsePersistence>>,
}

impl fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalProvider")
            .field("model", &self.model.id)
            .field("upstream", &self.model.upstream_name())
            .finish_non_exhaustive()
    }
}

/// Ollama-format chat request
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama-format chat response
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: Option<String>,
    message: OllamaResponseMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

/// Ollama models list response
#[derive(Debug, Deserialize)]
struct OllamaModelsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

impl LocalProvider {
    /// Create an adapter; the endpoint is resolved on first use
    pub fn new(model: ModelConfig, providers: Arc<ProvidersConfig>, client: Client) -> Self {
        info!(
            model = %model.id,
            upstream = %model.upstream_name(),
            "Initialized local provider"
        );
        Self {
            model,
            providers,
            client,
            persistence: None,
        }
    }

    /// Attach a response-persistence hook for streamed responses
    #[must_use]
    pub fn with_persistence(mut self, persistence: Option<Arc<dyn ResponsePersistence>>) -> Self {
        self.persistence = persistence;
        self
    }

    fn base_url(&self) -> Result<String, InferenceError> {
        Ok(self.providers.resolve(&self.model, false)?.base_url)
    }

    fn api_url(base_url: &str, endpoint: &str) -> String {
        format!("{base_url}/api/{}", endpoint.trim_start_matches('/'))
    }

    fn chat_request<'a>(
        &'a self,
        messages: &'a [ConversationMessage],
        options: &RequestOptions,
        stream: bool,
    ) -> OllamaChatRequest<'a> {
        let tuning = (options.temperature.is_some() || options.max_tokens.is_some()).then_some(
            OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        );
        OllamaChatRequest {
            model: self.model.upstream_name(),
            messages: wire_messages(messages),
            stream,
            options: tuning,
        }
    }

    async fn loaded_models(&self, base_url: &str) -> Result<Vec<String>, InferenceError> {
        let response = self
            .client
            .get(Self::api_url(base_url, "tags"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                InferenceError::ConnectionFailed(format!("local backend unreachable: {e}"))
            })?;
        let response = ensure_success(response).await?;

        let tags: OllamaModelsResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Two-step check: backend reachable, then model loaded
    async fn ensure_model_loaded(&self, base_url: &str) -> Result<(), InferenceError> {
        let models = self.loaded_models(base_url).await?;
        let wanted = self.model.upstream_name();
        let tagged = format!("{wanted}:latest");

        if models.iter().any(|name| name == wanted || *name == tagged) {
            Ok(())
        } else {
            warn!(model = %wanted, available = ?models, "Model not loaded on local backend");
            Err(InferenceError::ModelNotAvailable(wanted.to_string()))
        }
    }

    fn require_capability(&self, enabled: bool, capability: &str) -> Result<(), InferenceError> {
        if enabled {
            Ok(())
        } else {
            Err(InferenceError::NotSupported(format!(
                "model '{}' does not support {capability}",
                self.model.id
            )))
        }
    }
}

#[async_trait]
impl ProviderAdapter for LocalProvider {
    fn model_id(&self) -> &ModelId {
        &self.model.id
    }

    fn provider_kind(&self) -> &ProviderKind {
        &self.model.provider
    }

    #[instrument(skip(self, messages, options), fields(model = %self.model.id))]
    async fn chat_completions(
        &self,
        messages: &[ConversationMessage],
        options: &RequestOptions,
    ) -> Result<ChatCompletion, InferenceError> {
        self.require_capability(self.model.capabilities.chat, "chat")?;
        let base_url = self.base_url()?;
        let request = self.chat_request(messages, options, false);

        debug!("Sending request to local backend");

        let response = self
            .client
            .post(Self::api_url(&base_url, "chat"))
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::from_transport(&e, options.timeout_ms))?;
        let response = ensure_success(response).await?;

        let body: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;

        let usage = match (body.prompt_eval_count, body.eval_count) {
            (Some(prompt), Some(completion)) => Some(TokenUsage::new(prompt, completion)),
            _ => None,
        };

        debug!(tokens = ?usage, "Inference completed");

        Ok(ChatCompletion {
            content: body.message.content,
            model: body
                .model
                .unwrap_or_else(|| self.model.upstream_name().to_string()),
            usage,
            finish_reason: body
                .done_reason
                .or_else(|| body.done.then(|| "stop".to_string())),
        })
    }

    #[instrument(skip(self, messages, options), fields(model = %self.model.id))]
    async fn stream_chat_completions(
        &self,
        messages: &[ConversationMessage],
        options: &RequestOptions,
    ) -> Result<DeltaStream, InferenceError> {
        self.require_capability(self.model.capabilities.stream, "streaming")?;
        let base_url = self.base_url()?;
        self.ensure_model_loaded(&base_url).await?;

        let request = self.chat_request(messages, options, true);

        debug!("Starting streaming request to local backend");

        let response = self
            .client
            .post(Self::api_url(&base_url, "chat"))
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::from_transport(&e, options.timeout_ms))?;
        let response = ensure_success(response).await?;

        Ok(StreamRelay::new(WireFormat::Ndjson, self.model.id.as_str())
            .with_persistence(self.persistence.clone())
            .relay(response.bytes_stream()))
    }

    async fn create_embeddings(
        &self,
        _input: &[String],
        _options: &RequestOptions,
    ) -> Result<EmbeddingResponse, InferenceError> {
        Err(InferenceError::NotSupported(format!(
            "local backend does not provide embeddings (model '{}')",
            self.model.id
        )))
    }

    #[instrument(skip(self), fields(model = %self.model.id))]
    async fn health_check(&self) -> Result<bool, InferenceError> {
        let base_url = self.base_url()?;
        let response = self
            .client
            .get(Self::api_url(&base_url, "tags"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) if e.is_timeout() || e.is_connect() => Ok(false),
            Err(e) => Err(InferenceError::RequestFailed(e.to_string())),
        }
    }

    #[instrument(skip(self), fields(model = %self.model.id))]
    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let base_url = self.base_url()?;
        self.loaded_models(&base_url).await
    }
}
