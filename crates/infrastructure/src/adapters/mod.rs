//! Adapters implementing the ports of the inference core

mod metrics_recorder;
mod model_registry;
mod response_store;

pub use metrics_recorder::{MetricsCrateRecorder, RecorderSnapshot};
pub use model_registry::ConfigModelRegistry;
pub use response_store::{InMemoryResponseStore, ResponseStatus, StoredResponse};
