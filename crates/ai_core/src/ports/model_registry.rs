//! Model registry port

use async_trait::async_trait;
use domain::ModelConfig;
#[cfg(test)]
use mockall::automock;

use crate::error::InferenceError;

/// Resolves a model identifier to its configuration
///
/// Owned by the layer that stores model definitions; the coordination core
/// only consumes it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Look up a model by id
    ///
    /// Unknown ids fail with [`InferenceError::ModelNotAvailable`].
    async fn resolve(&self, model_id: &str) -> Result<ModelConfig, InferenceError>;
}
