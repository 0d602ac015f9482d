//! Multi-model request coordination
//!
//! Dispatches one conversation to many models in sequential batches of at
//! most `max_concurrent_requests`, gated by per-model circuit breakers and
//! optionally retried. Per-model failures are contained in the returned
//! [`DispatchResult`]s; only invalid input is returned as an error.

mod aggregation;
mod dispatch;

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use async_stream::stream;
use domain::{ConversationMessage, ModelConfig};
use futures::{StreamExt, future::join_all};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

pub use self::{
    aggregation::AggregatedResponse,
    dispatch::{DispatchFailure, DispatchResult},
};
use crate::{
    error::InferenceError,
    factory::AdapterFactory,
    options::RequestOptions,
    ports::{
        ChatCompletion, DeltaStream, MetricMetadata, MetricsRecorder, ProviderAdapter, StreamEvent,
    },
    resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, RetryHandler},
};

/// Construction-time settings of a coordinator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Settings for breakers created by this coordinator
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

/// Fans one request out to a fixed set of models
pub struct RequestCoordinator {
    factory: Arc<dyn AdapterFactory>,
    models: Vec<ModelConfig>,
    breakers: Arc<CircuitBreakerRegistry>,
    metrics: Option<Arc<dyn MetricsRecorder>>,
}

impl fmt::Debug for RequestCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field(
                "models",
                &self.models.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            )
            .field("breakers", &self.breakers)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestCoordinator {
    /// Create a coordinator over a non-empty set of distinct, valid models
    pub fn new(
        factory: Arc<dyn AdapterFactory>,
        models: Vec<ModelConfig>,
        config: CoordinatorConfig,
    ) -> Result<Self, InferenceError> {
        ModelConfig::validate_set(&models)
            .map_err(|e| InferenceError::InvalidArgument(e.to_string()))?;

        info!(models = models.len(), "Created request coordinator");

        Ok(Self {
            factory,
            models,
            breakers: Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker)),
            metrics: None,
        })
    }

    /// Share breaker state with other coordinators
    #[must_use]
    pub fn with_breakers(mut self, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = breakers;
        self
    }

    /// Report timings to a metrics sink
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Models this coordinator dispatches to, in input order
    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }

    /// Breaker registry consulted before each dispatch
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Dispatch `conversation` to every model and aggregate the outcomes
    ///
    /// Returns exactly one [`DispatchResult`] per model, even when all fail.
    #[instrument(skip(self, conversation, options), fields(models = self.models.len()))]
    pub async fn execute(
        &self,
        conversation: &[ConversationMessage],
        options: &RequestOptions,
    ) -> Result<AggregatedResponse, InferenceError> {
        options.validate()?;
        if conversation.is_empty() {
            return Err(InferenceError::InvalidArgument(
                "conversation must contain at least one message".to_string(),
            ));
        }

        let request_id = options
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let started = Instant::now();
        let mut results = Vec::with_capacity(self.models.len());

        for (index, batch) in self.models.chunks(options.max_concurrent_requests).enumerate() {
            debug!(
                request_id = %request_id,
                batch = index,
                size = batch.len(),
                "Dispatching batch"
            );
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|model| self.dispatch(model, conversation, options)),
            )
            .await;
            results.extend(outcomes);
        }

        let response = AggregatedResponse::build(
            request_id,
            options.aggregation,
            results,
            millis(started.elapsed()),
        );

        info!(
            request_id = %response.request_id,
            successful = response.successful_models,
            failed = response.failed_models,
            duration_ms = response.total_duration_ms,
            "Coordination completed"
        );

        self.report(&response, options);
        Ok(response)
    }

    /// Stream one model's response through its breaker
    ///
    /// The breaker records success when the stream ends with `Done` and
    /// failure when it ends with `Error`.
    #[instrument(skip(self, conversation, options), fields(model = %model.id))]
    pub async fn stream_single(
        &self,
        model: &ModelConfig,
        conversation: &[ConversationMessage],
        options: &RequestOptions,
    ) -> Result<DeltaStream, InferenceError> {
        options.validate()?;

        let mut outcome = match self.admit(model, options) {
            Admission::Refused => return Err(InferenceError::CircuitOpen(model.id.to_string())),
            Admission::Admitted(breaker) => OutcomeGuard::new(Some(breaker)),
            Admission::Unguarded => OutcomeGuard::new(None),
        };

        let adapter = self.factory.create(model).inspect_err(|e| outcome.settle(e))?;

        let timeout = Duration::from_millis(options.timeout_ms);
        let opened = tokio::time::timeout(
            timeout,
            adapter.stream_chat_completions(conversation, options),
        )
        .await
        .unwrap_or_else(|_| Err(InferenceError::Timeout(options.timeout_ms)));
        let inner = opened.inspect_err(|e| outcome.settle(e))?;

        Ok(Box::pin(stream! {
            let mut inner = inner;
            while let Some(event) = inner.next().await {
                match &event {
                    StreamEvent::Done { .. } => outcome.succeeded(),
                    StreamEvent::Error { message } => {
                        outcome.settle(&InferenceError::RequestFailed(message.clone()));
                    },
                    StreamEvent::Delta { .. } => {},
                }
                yield event;
            }
        }))
    }

    fn admit(&self, model: &ModelConfig, options: &RequestOptions) -> Admission {
        if !options.circuit_breaker_enabled {
            return Admission::Unguarded;
        }
        let breaker = self.breakers.breaker(model.id.as_str());
        if breaker.allow_request() {
            Admission::Admitted(breaker)
        } else {
            Admission::Refused
        }
    }

    async fn dispatch(
        &self,
        model: &ModelConfig,
        conversation: &[ConversationMessage],
        options: &RequestOptions,
    ) -> DispatchResult {
        let mut outcome = match self.admit(model, options) {
            Admission::Refused => {
                debug!(model = %model.id, "Circuit open, skipping dispatch");
                return DispatchResult::circuit_open(model);
            },
            Admission::Admitted(breaker) => OutcomeGuard::new(Some(breaker)),
            Admission::Unguarded => OutcomeGuard::new(None),
        };

        let started = Instant::now();
        let (result, attempts) = match self.factory.create(model) {
            Ok(adapter) => self.call_with_retry(adapter.as_ref(), conversation, options).await,
            Err(e) => (Err(e), 0),
        };
        let duration_ms = millis(started.elapsed());

        match result {
            Ok(completion) => {
                outcome.succeeded();
                debug!(model = %model.id, duration_ms, attempts, "Model dispatch succeeded");
                DispatchResult::success(model, completion, duration_ms, attempts)
            },
            Err(err) => {
                outcome.settle(&err);
                warn!(
                    model = %model.id,
                    duration_ms,
                    attempts,
                    error = %err,
                    "Model dispatch failed"
                );
                DispatchResult::failure(model, &err, duration_ms, attempts)
            },
        }
    }

    async fn call_with_retry(
        &self,
        adapter: &dyn ProviderAdapter,
        conversation: &[ConversationMessage],
        options: &RequestOptions,
    ) -> (Result<ChatCompletion, InferenceError>, u32) {
        let timeout_ms = options.timeout_ms;
        let attempt = move || async move {
            tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                adapter.chat_completions(conversation, options),
            )
            .await
            .unwrap_or_else(|_| Err(InferenceError::Timeout(timeout_ms)))
        };

        match &options.retry {
            Some(config) => {
                let outcome = RetryHandler::new(config.clone()).run(attempt).await;
                (outcome.result, outcome.attempts)
            },
            None => (attempt().await, 1),
        }
    }

    fn report(&self, response: &AggregatedResponse, options: &RequestOptions) {
        let Some(metrics) = &self.metrics else {
            return;
        };

        for result in &response.results {
            let mut metadata = options.metadata.clone();
            metadata.insert("request_id".into(), response.request_id.clone().into());
            metadata.insert("model_id".into(), result.model_id.as_str().into());
            metadata.insert("provider".into(), result.provider.clone().into());
            metadata.insert("success".into(), result.is_success().into());
            metadata.insert("attempts".into(), result.attempts.into());
            metrics.record_metric("model_dispatch", result.duration_ms, &metadata);
        }

        metrics.record_multi_model_metrics(
            &response.request_id,
            response.results.len(),
            response.total_duration_ms,
            &response.results,
            &options.metadata,
        );

        if let Some(overhead) = response.coordination_overhead_ms {
            let mut metadata: MetricMetadata = options.metadata.clone();
            metadata.insert("request_id".into(), response.request_id.clone().into());
            metrics.record_metric("coordination_overhead", overhead, &metadata);
        }
    }
}

/// Result of consulting a model's breaker
enum Admission {
    /// Breakers disabled for this request
    Unguarded,
    /// Circuit open, no call may be made
    Refused,
    /// Call admitted; the outcome must be recorded on this breaker
    Admitted(Arc<CircuitBreaker>),
}

/// Records a breaker outcome exactly once
///
/// Local failures release a half-open permit instead of counting as a
/// failure. Dropping an unsettled guard (a stream abandoned mid-way) also
/// releases the permit.
struct OutcomeGuard {
    breaker: Option<Arc<CircuitBreaker>>,
}

impl OutcomeGuard {
    const fn new(breaker: Option<Arc<CircuitBreaker>>) -> Self {
        Self { breaker }
    }

    fn succeeded(&mut self) {
        if let Some(breaker) = self.breaker.take() {
            breaker.record_success();
        }
    }

    fn settle(&mut self, err: &InferenceError) {
        if let Some(breaker) = self.breaker.take() {
            if err.is_local() {
                breaker.release_trial();
            } else {
                breaker.record_failure();
            }
        }
    }
}

impl Drop for OutcomeGuard {
    fn drop(&mut self) {
        if let Some(breaker) = self.breaker.take() {
            breaker.release_trial();
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
