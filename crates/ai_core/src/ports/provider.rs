//! Provider adapter port
//!
//! One capability interface hides every backend protocol. Adapters are
//! selected by [`ProviderFactory`](crate::factory::ProviderFactory) from the
//! model's provider kind.

use std::pin::Pin;

use async_trait::async_trait;
use domain::{ConversationMessage, ModelId, ProviderKind};
use futures::Stream;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::{error::InferenceError, options::RequestOptions};

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Usage from prompt and completion counts
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Complete (non-streaming) chat response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Generated content
    pub content: String,
    /// Model that generated the response
    pub model: String,
    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Finish reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Embedding vectors for a batch of inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// One vector per input, in input order
    pub embeddings: Vec<Vec<f32>>,
    /// Model that produced the vectors
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Uniform incremental event emitted by every streaming adapter
///
/// A stream carries any number of `Delta` events followed by exactly one
/// terminal event (`Done` or `Error`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A fragment of generated content
    Delta { content: String },
    /// Normal completion
    Done {
        /// Persisted response record, when a persistence hook is attached
        response_id: Option<String>,
        /// Full accumulated content
        content: String,
    },
    /// The backend failed after streaming had begun
    Error { message: String },
}

impl StreamEvent {
    /// Whether this event ends the stream
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Delta { .. })
    }

    /// Render as one `data: {...}\n\n` frame
    pub fn to_sse_frame(&self) -> String {
        let payload = match self {
            Self::Delta { content } => serde_json::json!({
                "content": content,
                "done": false,
            }),
            Self::Done {
                response_id,
                content,
            } => serde_json::json!({
                "done": true,
                "response_id": response_id,
                "content": content,
            }),
            Self::Error { message } => serde_json::json!({
                "done": true,
                "error": message,
            }),
        };
        format!("data: {payload}\n\n")
    }
}

/// Stream of uniform events
pub type DeltaStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Port for model backends
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Model this adapter serves
    fn model_id(&self) -> &ModelId;

    /// Backend protocol family
    fn provider_kind(&self) -> &ProviderKind;

    /// Generate a complete response
    async fn chat_completions(
        &self,
        messages: &[ConversationMessage],
        options: &RequestOptions,
    ) -> Result<ChatCompletion, InferenceError>;

    /// Generate a streaming response
    ///
    /// Failures before the first byte are returned as `Err`; afterwards every
    /// backend error becomes a terminal [`StreamEvent::Error`].
    async fn stream_chat_completions(
        &self,
        messages: &[ConversationMessage],
        options: &RequestOptions,
    ) -> Result<DeltaStream, InferenceError>;

    /// Embed a batch of inputs
    async fn create_embeddings(
        &self,
        input: &[String],
        options: &RequestOptions,
    ) -> Result<EmbeddingResponse, InferenceError>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> Result<bool, InferenceError>;

    /// List models the backend offers
    async fn list_models(&self) -> Result<Vec<String>, InferenceError>;
}
