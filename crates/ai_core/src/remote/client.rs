//! OpenAI-compatible remote backend adapter
//!
//! Covers OpenAI itself and every provider speaking the same HTTP protocol
//! (Groq, Together, OpenRouter, vLLM, ...). Unrecognized provider kinds land
//! here.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use domain::{ConversationMessage, ModelConfig, ModelId, ProviderKind};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    config::{ProvidersConfig, ResolvedEndpoint},
    error::InferenceError,
    http::{PROBE_TIMEOUT, WireMessage, ensure_success, wire_messages},
    options::RequestOptions,
    ports::{
        ChatCompletion, DeltaStream, EmbeddingResponse, ProviderAdapter, ResponsePersistence,
        TokenUsage,
    },
    streaming::{StreamRelay, WireFormat},
};

/// Adapter for an OpenAI-compatible HTTP API
pub struct RemoteProvider {
    model: ModelConfig,
    providers: Arc<ProvidersConfig>,
    client: Client,
    persistence: Option<Arc<dyn ResponsePersistence>>,
}

impl fmt::Debug for RemoteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteProvider")
            .field("model", &self.model.id)
            .field("provider", &self.model.provider)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponseBody {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl RemoteProvider {
    /// Create an adapter; endpoint and credential are resolved on first use
    pub fn new(model: ModelConfig, providers: Arc<ProvidersConfig>, client: Client) -> Self {
        info!(
            model = %model.id,
            provider = %model.provider,
            "Initialized remote provider"
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

    fn endpoint(&self) -> Result<ResolvedEndpoint, InferenceError> {
        self.providers.resolve(&self.model, true)
    }

    fn authorized(builder: RequestBuilder, endpoint: &ResolvedEndpoint) -> RequestBuilder {
        match &endpoint.credential {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    fn chat_request<'a>(
        &'a self,
        messages: &'a [ConversationMessage],
        options: &RequestOptions,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: self.model.upstream_name(),
            messages: wire_messages(messages),
            stream,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }

    async fn post_chat(
        &self,
        messages: &[ConversationMessage],
        options: &RequestOptions,
        stream: bool,
    ) -> Result<reqwest::Response, InferenceError> {
        let endpoint = self.endpoint()?;
        let request = self.chat_request(messages, options, stream);

        let builder = self
            .client
            .post(format!("{}/chat/completions", endpoint.base_url))
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&request);
        let response = Self::authorized(builder, &endpoint)
            .send()
            .await
            .map_err(|e| InferenceError::from_transport(&e, options.timeout_ms))?;
        ensure_success(response).await
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
impl ProviderAdapter for RemoteProvider {
    fn model_id(&self) -> &ModelId {
        &self.model.id
    }

    fn provider_kind(&self) -> &ProviderKind {
        &self.model.provider
    }

    #[instrument(skip(self, messages, options), fields(model = %self.model.id, provider = %self.model.provider))]
    async fn chat_completions(
        &self,
        messages: &[ConversationMessage],
        options: &RequestOptions,
    ) -> Result<ChatCompletion, InferenceError> {
        self.require_capability(self.model.capabilities.chat, "chat")?;

        debug!("Sending request to remote provider");
        let response = self.post_chat(messages, options, false).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::InvalidResponse("response has no choices".to_string()))?;

        debug!(tokens = ?body.usage, "Inference completed");

        Ok(ChatCompletion {
            content: choice.message.content.unwrap_or_default(),
            model: body
                .model
                .unwrap_or_else(|| self.model.upstream_name().to_string()),
            usage: body.usage,
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, messages, options), fields(model = %self.model.id, provider = %self.model.provider))]
    async fn stream_chat_completions(
        &self,
        messages: &[ConversationMessage],
        options: &RequestOptions,
    ) -> Result<DeltaStream, InferenceError> {
        self.require_capability(self.model.capabilities.stream, "streaming")?;

        debug!("Starting streaming request to remote provider");
        let response = self.post_chat(messages, options, true).await?;

        Ok(StreamRelay::new(WireFormat::Sse, self.model.id.as_str())
            .with_persistence(self.persistence.clone())
            .relay(response.bytes_stream()))
    }

    #[instrument(skip(self, input, options), fields(model = %self.model.id, inputs = input.len()))]
    async fn create_embeddings(
        &self,
        input: &[String],
        options: &RequestOptions,
    ) -> Result<EmbeddingResponse, InferenceError> {
        self.require_capability(self.model.capabilities.embeddings, "embeddings")?;
        if input.is_empty() {
            return Err(InferenceError::InvalidArgument(
                "embedding input must not be empty".to_string(),
            ));
        }
        let endpoint = self.endpoint()?;

        let builder = self
            .client
            .post(format!("{}/embeddings", endpoint.base_url))
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&EmbeddingRequest {
                model: self.model.upstream_name(),
                input,
            });
        let response = Self::authorized(builder, &endpoint)
            .send()
            .await
            .map_err(|e| InferenceError::from_transport(&e, options.timeout_ms))?;
        let response = ensure_success(response).await?;

        let mut body: EmbeddingResponseBody = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;
        if body.data.len() != input.len() {
            return Err(InferenceError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                input.len(),
                body.data.len()
            )));
        }
        body.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));

        Ok(EmbeddingResponse {
            embeddings: body.data.into_iter().map(|d| d.embedding).collect(),
            model: body
                .model
                .unwrap_or_else(|| self.model.upstream_name().to_string()),
            usage: body.usage,
        })
    }

    #[instrument(skip(self), fields(model = %self.model.id))]
    async fn health_check(&self) -> Result<bool, InferenceError> {
        let endpoint = self.endpoint()?;
        let builder = self
            .client
            .get(format!("{}/models", endpoint.base_url))
            .timeout(PROBE_TIMEOUT);

        match Self::authorized(builder, &endpoint).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) if e.is_timeout() || e.is_connect() => Ok(false),
            Err(e) => Err(InferenceError::RequestFailed(e.to_string())),
        }
    }

    #[instrument(skip(self), fields(model = %self.model.id))]
    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let endpoint = self.endpoint()?;
        let builder = self
            .client
            .get(format!("{}/models", endpoint.base_url))
            .timeout(PROBE_TIMEOUT);
        let response = Self::authorized(builder, &endpoint)
            .send()
            .await
            .map_err(|e| InferenceError::from_transport(&e, 5_000))?;
        let response = ensure_success(response).await?;

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use domain::ModelCapabilities;

    use super::*;
    use crate::config::ProviderSettings;

    fn provider(model: ModelConfig) -> RemoteProvider {
        let providers = ProvidersConfig::new().with_provider(
            "openai",
            ProviderSettings::with_base_url("https://api.openai.com/v1").with_api_key("sk-test"),
        );
        RemoteProvider::new(model, Arc::new(providers), Client::new())
    }

    #[test]
    fn request_shape() {
        let adapter = provider(ModelConfig::remote("gpt-4o", "openai"));
        let messages = vec![ConversationMessage::user("Hi")];
        let options = RequestOptions::default().with_max_tokens(16);
        let json = serde_json::to_value(adapter.chat_request(&messages, &options, true)).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 16);
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn embeddings_require_capability() {
        let adapter = provider(ModelConfig::remote("gpt-4o", "openai"));
        let err = adapter
            .create_embeddings(&["x".to_string()], &RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::NotSupported(_)));
    }

    #[tokio::test]
    async fn empty_embedding_input_rejected() {
        let adapter = provider(
            ModelConfig::remote("text-embedding-3-small", "openai")
                .with_capabilities(ModelCapabilities::embeddings_only()),
        );
        let err = adapter
            .create_embeddings(&[], &RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unknown_provider_is_configuration_error() {
        let adapter = provider(ModelConfig::remote("mixtral", "groq"));
        let err = adapter
            .chat_completions(&[ConversationMessage::user("Hi")], &RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Configuration(_)));
        assert!(!err.to_string().contains("sk-test"));
    }
}
