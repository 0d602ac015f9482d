//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// A model configuration is unusable
    #[error("Invalid model configuration: {0}")]
    InvalidModelConfig(String),

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// Entity not found
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },
}

impl DomainError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_creates_correct_error() {
        let err = DomainError::not_found("Model", "gpt-4o");
        match err {
            DomainError::NotFound { entity_type, id } => {
                assert_eq!(entity_type, "Model");
                assert_eq!(id, "gpt-4o");
            },
            _ => unreachable!("Expected NotFound error"),
        }
    }

    #[test]
    fn not_found_error_message_is_correct() {
        let err = DomainError::not_found("Model", "llama3");
        assert_eq!(err.to_string(), "Model not found: llama3");
    }

    #[test]
    fn invalid_model_config_message() {
        let err = DomainError::InvalidModelConfig("empty id".to_string());
        assert_eq!(err.to_string(), "Invalid model configuration: empty id");
    }
}
