//! Model registry adapter - Implements ModelRegistry from configured models

use std::collections::HashMap;

use ai_core::{InferenceError, ModelRegistry};
use async_trait::async_trait;
use domain::ModelConfig;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::config::AppConfig;

/// In-memory registry seeded from configuration
///
/// Models can be registered or removed at runtime, e.g. after a config reload.
#[derive(Debug, Default)]
pub struct ConfigModelRegistry {
    models: RwLock<HashMap<String, ModelConfig>>,
}

impl ConfigModelRegistry {
    /// Registry holding the given models; later duplicates replace earlier ones
    pub fn from_models(models: impl IntoIterator<Item = ModelConfig>) -> Self {
        let models = models
            .into_iter()
            .map(|model| (model.id.as_str().to_string(), model))
            .collect();
        Self {
            models: RwLock::new(models),
        }
    }

    /// Registry holding the models of an application config
    pub fn from_config(config: &AppConfig) -> Self {
        Self::from_models(config.models.iter().cloned())
    }

    /// Add or replace a model
    pub fn register(&self, model: ModelConfig) {
        debug!(model = %model.id, provider = %model.provider, "Registering model");
        self.models
            .write()
            .insert(model.id.as_str().to_string(), model);
    }

    /// Remove a model, returning its previous configuration
    pub fn remove(&self, model_id: &str) -> Option<ModelConfig> {
        self.models.write().remove(model_id)
    }

    /// Registered model ids, sorted
    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ModelRegistry for ConfigModelRegistry {
    #[instrument(skip(self))]
    async fn resolve(&self, model_id: &str) -> Result<ModelConfig, InferenceError> {
        self.models
            .read()
            .get(model_id.trim())
            .cloned()
            .ok_or_else(|| InferenceError::ModelNotAvailable(model_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use domain::ProviderKind;

    use super::*;

    fn registry() -> ConfigModelRegistry {
        ConfigModelRegistry::from_models([
            ModelConfig::local("llama3"),
            ModelConfig::remote("gpt-4o", "openai"),
        ])
    }

    #[tokio::test]
    async fn resolves_known_models() {
        let model = registry().resolve("gpt-4o").await.unwrap();
        assert_eq!(model.provider, ProviderKind::Remote("openai".to_string()));

        let trimmed = registry().resolve(" llama3 ").await.unwrap();
        assert!(trimmed.provider.is_local());
    }

    #[tokio::test]
    async fn unknown_model_is_not_available() {
        let err = registry().resolve("mistral").await.unwrap_err();
        assert!(matches!(err, InferenceError::ModelNotAvailable(ref id) if id == "mistral"));
    }

    #[tokio::test]
    async fn register_and_remove() {
        let registry = registry();
        registry.register(ModelConfig::remote("mixtral", "groq"));
        assert_eq!(registry.model_ids(), vec!["gpt-4o", "llama3", "mixtral"]);
        assert!(registry.resolve("mixtral").await.is_ok());

        assert!(registry.remove("llama3").is_some());
        assert!(registry.resolve("llama3").await.is_err());
    }

    #[test]
    fn seeded_from_app_config() {
        let config = AppConfig {
            models: vec![ModelConfig::local("phi3")],
            ..AppConfig::default()
        };
        assert_eq!(ConfigModelRegistry::from_config(&config).model_ids(), vec!["phi3"]);
    }
}
