//! Response persistence port

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::InferenceError;

/// Hook invoked at the start and end of a streamed response
///
/// Failures are logged by the stream relay and never abort the stream.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResponsePersistence: Send + Sync {
    /// Create an empty record for a response that has started streaming
    ///
    /// Returns the identifier of the new record.
    async fn create_placeholder(&self, model_id: &str) -> Result<String, InferenceError>;

    /// Store the final content of a streamed response
    async fn finalize(
        &self,
        response_id: &str,
        content: &str,
        token_estimate: u64,
    ) -> Result<(), InferenceError>;

    /// Mark a response whose stream failed before its terminal signal
    ///
    /// The partial content is kept for inspection but never finalized.
    async fn mark_failed(
        &self,
        response_id: &str,
        partial_content: &str,
        reason: &str,
    ) -> Result<(), InferenceError>;
}
