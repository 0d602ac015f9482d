//! Adapter selection and coordinator construction

use std::{fmt, sync::Arc};

use domain::{ModelConfig, ProviderKind};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::{
    config::ProvidersConfig,
    coordinator::{CoordinatorConfig, RequestCoordinator},
    error::InferenceError,
    http::build_client,
    local::LocalProvider,
    ports::{ModelRegistry, ProviderAdapter, ResponsePersistence},
    remote::RemoteProvider,
};

/// Builds a [`ProviderAdapter`] for a model
///
/// The coordinator depends on this trait rather than on [`ProviderFactory`]
/// so that adapters can be substituted.
pub trait AdapterFactory: Send + Sync {
    /// Adapter serving `model`
    fn create(&self, model: &ModelConfig) -> Result<Arc<dyn ProviderAdapter>, InferenceError>;
}

/// Maps provider kinds to adapters sharing one HTTP client and configuration
#[derive(Clone)]
pub struct ProviderFactory {
    providers: Arc<ProvidersConfig>,
    client: Client,
    persistence: Option<Arc<dyn ResponsePersistence>>,
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("providers", &self.providers.providers().collect::<Vec<_>>())
            .field("persistence", &self.persistence.is_some())
            .finish_non_exhaustive()
    }
}

impl ProviderFactory {
    /// Create a factory with its own HTTP client
    pub fn new(providers: ProvidersConfig) -> Result<Self, InferenceError> {
        Ok(Self::with_client(providers, build_client()?))
    }

    /// Create a factory around an existing HTTP client
    pub fn with_client(providers: ProvidersConfig, client: Client) -> Self {
        Self {
            providers: Arc::new(providers),
            client,
            persistence: None,
        }
    }

    /// Attach a response-persistence hook handed to every adapter
    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn ResponsePersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Provider configuration shared by the adapters
    pub fn providers(&self) -> &ProvidersConfig {
        &self.providers
    }

    /// Build a coordinator over `models`
    ///
    /// Fails with [`InferenceError::InvalidArgument`] for an empty list,
    /// an invalid model or duplicate ids.
    pub fn create_multi_model(
        self: &Arc<Self>,
        models: Vec<ModelConfig>,
        config: CoordinatorConfig,
    ) -> Result<RequestCoordinator, InferenceError> {
        let factory: Arc<dyn AdapterFactory> = Arc::clone(self) as Arc<dyn AdapterFactory>;
        RequestCoordinator::new(factory, models, config)
    }

    /// Resolve model ids through a registry, preserving order
    #[instrument(skip(registry))]
    pub async fn resolve_models(
        registry: &dyn ModelRegistry,
        ids: &[String],
    ) -> Result<Vec<ModelConfig>, InferenceError> {
        let mut models = Vec::with_capacity(ids.len());
        for id in ids {
            models.push(registry.resolve(id).await?);
        }
        Ok(models)
    }
}

impl AdapterFactory for ProviderFactory {
    fn create(&self, model: &ModelConfig) -> Result<Arc<dyn ProviderAdapter>, InferenceError> {
        model
            .validate()
            .map_err(|e| InferenceError::InvalidArgument(e.to_string()))?;

        let adapter: Arc<dyn ProviderAdapter> = match &model.provider {
            ProviderKind::Local => {
                debug!(model = %model.id, "Selecting local adapter");
                Arc::new(
                    LocalProvider::new(model.clone(), Arc::clone(&self.providers), self.client.clone())
                        .with_persistence(self.persistence.clone()),
                )
            },
            ProviderKind::Remote(name) => {
                debug!(model = %model.id, provider = %name, "Selecting remote adapter");
                Arc::new(
                    RemoteProvider::new(model.clone(), Arc::clone(&self.providers), self.client.clone())
                        .with_persistence(self.persistence.clone()),
                )
            },
        };
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::ports::MockModelRegistry;

    fn factory() -> ProviderFactory {
        ProviderFactory::with_client(ProvidersConfig::new(), Client::new())
    }

    #[test]
    fn local_kinds_map_to_local_adapter() {
        let adapter = factory()
            .create(&ModelConfig::new("llama3", ProviderKind::parse("ollama")))
            .unwrap();
        assert!(adapter.provider_kind().is_local());
        assert_eq!(adapter.model_id().as_str(), "llama3");
    }

    #[test]
    fn unknown_kinds_default_to_remote() {
        let adapter = factory()
            .create(&ModelConfig::remote("some-model", "brand-new-cloud"))
            .unwrap();
        assert_eq!(
            adapter.provider_kind(),
            &ProviderKind::Remote("brand-new-cloud".to_string())
        );
    }

    #[test]
    fn create_does_not_require_configuration() {
        // Endpoint and credential are resolved on first use
        assert!(factory().create(&ModelConfig::remote("gpt-4o", "openai")).is_ok());
    }

    #[test]
    fn create_multi_model_rejects_empty_list() {
        let factory = Arc::new(factory());
        let err = factory
            .create_multi_model(Vec::new(), CoordinatorConfig::default())
            .unwrap_err();
        assert!(matches!(err, InferenceError::InvalidArgument(_)));
    }

    #[test]
    fn create_multi_model_rejects_duplicates() {
        let factory = Arc::new(factory());
        let err = factory
            .create_multi_model(
                vec![ModelConfig::local("llama3"), ModelConfig::local("llama3")],
                CoordinatorConfig::default(),
            )
            .unwrap_err();
        assert!(matches!(err, InferenceError::InvalidArgument(_)));
    }

    #[test]
    fn create_multi_model_accepts_valid_set() {
        let factory = Arc::new(factory());
        let coordinator = factory
            .create_multi_model(
                vec![
                    ModelConfig::local("llama3"),
                    ModelConfig::remote("gpt-4o", "openai"),
                ],
                CoordinatorConfig::default(),
            )
            .unwrap();
        assert_eq!(coordinator.models().len(), 2);
    }

    #[tokio::test]
    async fn resolve_models_in_order() {
        let mut registry = MockModelRegistry::new();
        registry
            .expect_resolve()
            .with(eq("b"))
            .returning(|id| Ok(ModelConfig::local(id)));
        registry
            .expect_resolve()
            .with(eq("a"))
            .returning(|id| Ok(ModelConfig::remote(id, "openai")));

        let ids = vec!["b".to_string(), "a".to_string()];
        let models = ProviderFactory::resolve_models(&registry, &ids).await.unwrap();
        let resolved: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(resolved, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn resolve_models_propagates_unknown_id() {
        let mut registry = MockModelRegistry::new();
        registry
            .expect_resolve()
            .returning(|id| Err(InferenceError::ModelNotAvailable(id.to_string())));

        let err = ProviderFactory::resolve_models(&registry, &["ghost".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::ModelNotAvailable(_)));
    }
}
