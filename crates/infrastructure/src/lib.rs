//! Infrastructure layer - Concrete collaborators for the inference core
//!
//! Implements the ports declared by `ai_core` and provides the ambient
//! plumbing around them: layered configuration loading and logging setup.

pub mod adapters;
pub mod config;
pub mod telemetry;

pub use adapters::{ConfigModelRegistry, InMemoryResponseStore, MetricsCrateRecorder};
pub use config::AppConfig;
pub use telemetry::{LoggingConfig, TelemetryError, init_logging};
