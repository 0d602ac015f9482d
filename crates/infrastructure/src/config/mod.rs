//! Application configuration
//!
//! Layered with the `config` crate, later sources overriding earlier ones:
//! - built-in defaults
//! - `inference-gateway.toml` (optional) or an explicit file
//! - `INFERENCE_GATEWAY_*` environment variables, `__` separating sections
//!   (e.g. `INFERENCE_GATEWAY_LOGGING__JSON=true`)

use std::path::Path;

use ai_core::{
    CircuitBreakerConfig, CoordinatorConfig, ProvidersConfig, RequestOptions, RetryConfig,
};
use domain::ModelConfig;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::telemetry::LoggingConfig;

const DEFAULT_FILE: &str = "inference-gateway";
const ENV_PREFIX: &str = "INFERENCE_GATEWAY";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Endpoints and credentials per provider kind
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Models known to the gateway
    #[serde(default)]
    pub models: Vec<ModelConfig>,

    /// Breaker thresholds for coordinators built from this config
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry policy applied when the request defaults carry none
    #[serde(default)]
    pub retry: Option<RetryConfig>,

    /// Default request options
    #[serde(default)]
    pub coordinator: RequestOptions,

    /// Logging setup
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment and optional file
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::build(config::File::with_name(DEFAULT_FILE).required(false))
    }

    /// Load configuration from an explicit file, then environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        Self::build(config::File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .set_default("providers.ollama.base_url", "http://localhost:11434")?
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: Self = config.try_deserialize()?;
        app.validate()?;
        debug!(
            models = app.models.len(),
            providers = app.providers.providers().count(),
            "Configuration loaded"
        );
        Ok(app)
    }

    /// Reject model lists and request defaults the coordinator would refuse
    ///
    /// An empty model list is accepted; models may come from elsewhere.
    ///
    /// Remote providers without any credential only produce a warning: the
    /// models using them fail with a configuration error on first use.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if !self.models.is_empty() {
            ModelConfig::validate_set(&self.models)
                .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        }
        self.request_options()
            .validate()
            .map_err(|e| config::ConfigError::Message(format!("coordinator: {e}")))?;

        for model in self.models.iter().filter(|m| !m.provider.is_local()) {
            let key = model.provider.config_key();
            let has_credential = model.credential_ref.is_some()
                || self.providers.get(key).is_some_and(|settings| {
                    settings.api_key_env.is_some()
                        || settings
                            .api_key
                            .as_ref()
                            .is_some_and(|k| !k.expose_secret().is_empty())
                });
            if !has_credential {
                warn!(model = %model.id, provider = key, "No credential configured for remote model");
            }
        }
        Ok(())
    }

    /// Coordinator construction settings
    pub const fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            circuit_breaker: self.circuit_breaker,
        }
    }

    /// Default request options, with the top-level retry policy filled in
    pub fn request_options(&self) -> RequestOptions {
        let mut options = self.coordinator.clone();
        if options.retry.is_none() {
            options.retry.clone_from(&self.retry);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use ai_core::AggregationStrategy;
    use domain::ProviderKind;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const FULL: &str = r#"
[providers.openai]
base_url = "https://api.openai.com/v1"
api_key = "sk-file"

[providers.groq]
base_url = "https://api.groq.com/openai/v1"
api_key_env = "GROQ_API_KEY"

[[models]]
id = "llama3"
provider = "ollama"

[[models]]
id = "gpt-4o"
provider = "openai"
upstream_model = "gpt-4o-2024-08-06"
pricing = { prompt_per_1k = 0.005, completion_per_1k = 0.015 }

[circuit_breaker]
failure_threshold = 3
cooldown_ms = 10000

[retry]
max_attempts = 4
base_delay_ms = 200
max_delay_ms = 2000

[coordinator]
max_concurrent_requests = 2
aggregation = "fastest"

[logging]
json = true
"#;

    #[test]
    fn loads_full_file() {
        let file = write_config(FULL);
        let config = AppConfig::load_from(file.path()).unwrap();

        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[0].provider, ProviderKind::Local);
        assert_eq!(config.models[1].upstream_name(), "gpt-4o-2024-08-06");
        assert!(config.models[1].pricing.is_some());

        let openai = config.providers.get("openai").unwrap();
        assert_eq!(openai.api_key.as_ref().unwrap().expose_secret(), "sk-file");
        assert_eq!(
            config.providers.get("groq").unwrap().api_key_env.as_deref(),
            Some("GROQ_API_KEY")
        );

        assert_eq!(config.circuit_breaker, CircuitBreakerConfig::custom(3, 10_000));
        assert_eq!(config.coordinator.max_concurrent_requests, 2);
        assert_eq!(config.coordinator.aggregation, AggregationStrategy::Fastest);
        assert!(config.logging.json);
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let file = write_config("[logging]\nfilter = \"debug\"\n");
        let config = AppConfig::load_from(file.path()).unwrap();

        assert!(config.models.is_empty());
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.circuit_breaker, CircuitBreakerConfig::default());
        assert_eq!(config.coordinator.timeout_ms, 30_000);
        assert_eq!(config.coordinator.max_concurrent_requests, 5);
        assert!(config.retry.is_none());
        assert_eq!(
            config.providers.get("ollama").unwrap().base_url.as_deref(),
            Some("http://localhost:11434")
        );
    }

    #[test]
    fn top_level_retry_fills_request_defaults() {
        let file = write_config(FULL);
        let config = AppConfig::load_from(file.path()).unwrap();

        let options = config.request_options();
        assert_eq!(options.retry.unwrap().max_attempts, 4);
        assert_eq!(
            config.coordinator_config().circuit_breaker.failure_threshold,
            3
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load_from(dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn duplicate_models_are_rejected() {
        let file = write_config(
            "[[models]]\nid = \"llama3\"\nprovider = \"ollama\"\n\n[[models]]\nid = \"llama3\"\nprovider = \"ollama\"\n",
        );
        assert!(AppConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let file = write_config("[coordinator]\nmax_concurrent_requests = 0\n");
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("coordinator"));
    }
}
