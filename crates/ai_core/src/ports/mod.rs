//! Port definitions
//!
//! Traits the coordination core implements (provider adapters) or consumes
//! from surrounding layers (model registry, metrics sink, response store).

mod metrics;
mod model_registry;
mod persistence;
mod provider;

#[cfg(test)]
pub use metrics::MockMetricsRecorder;
pub use metrics::{MetricMetadata, MetricsRecorder};
#[cfg(test)]
pub use model_registry::MockModelRegistry;
pub use model_registry::ModelRegistry;
#[cfg(test)]
pub use persistence::MockResponsePersistence;
pub use persistence::ResponsePersistence;
#[cfg(test)]
pub use provider::MockProviderAdapter;
pub use provider::{
    ChatCompletion, DeltaStream, EmbeddingResponse, ProviderAdapter, StreamEvent, TokenUsage,
};
