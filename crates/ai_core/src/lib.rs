//! AI Core - multi-provider inference coordination
//!
//! Hides heterogeneous model backends behind one [`ProviderAdapter`]
//! interface and coordinates requests across them:
//!
//! - [`local`] and [`remote`]: Ollama-style and OpenAI-compatible adapters
//! - [`factory`]: adapter selection by provider kind
//! - [`resilience`]: per-model circuit breakers and retry with backoff
//! - [`streaming`]: translation of NDJSON and SSE streams into [`StreamEvent`]s
//! - [`coordinator`]: batched concurrent dispatch and result aggregation

pub mod config;
pub mod coordinator;
pub mod error;
pub mod factory;
mod http;
pub mod local;
pub mod options;
pub mod ports;
pub mod remote;
pub mod resilience;
pub mod streaming;

pub use config::{ProviderSettings, ProvidersConfig};
pub use coordinator::{
    AggregatedResponse, CoordinatorConfig, DispatchFailure, DispatchResult, RequestCoordinator,
};
pub use error::{FailureKind, InferenceError};
pub use factory::{AdapterFactory, ProviderFactory};
pub use local::LocalProvider;
pub use options::{AggregationStrategy, RequestOptions};
pub use ports::{
    ChatCompletion, DeltaStream, EmbeddingResponse, MetricMetadata, MetricsRecorder,
    ModelRegistry, ProviderAdapter, ResponsePersistence, StreamEvent, TokenUsage,
};
pub use remote::RemoteProvider;
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, RetryConfig,
    RetryHandler,
};
