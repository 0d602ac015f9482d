//! Metrics recorder adapter - Forwards coordinator timings to the `metrics` facade
//!
//! Whatever exporter the host installs (Prometheus, StatsD, ...) receives the
//! values; without one the macros are no-ops. Running totals are kept locally
//! so they can be inspected without an exporter.

use std::sync::atomic::{AtomicU64, Ordering};

use ai_core::{DispatchResult, MetricMetadata, MetricsRecorder};
use serde::Serialize;
use tracing::debug;

const OPERATION_DURATION: &str = "inference_operation_duration_ms";
const OPERATIONS_TOTAL: &str = "inference_operations_total";
const RUN_DURATION: &str = "inference_multi_model_duration_ms";
const RUNS_TOTAL: &str = "inference_multi_model_requests_total";
const DISPATCHES_TOTAL: &str = "inference_model_dispatch_total";
const TOKENS_TOTAL: &str = "inference_tokens_total";

/// Local totals of everything recorded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecorderSnapshot {
    /// `record_metric` calls
    pub operations: u64,
    /// Coordinator runs
    pub runs: u64,
    /// Successful model dispatches
    pub dispatches_succeeded: u64,
    /// Failed model dispatches (circuit-open included)
    pub dispatches_failed: u64,
    /// Tokens reported by successful dispatches
    pub total_tokens: u64,
}

/// `MetricsRecorder` backed by the `metrics` crate
#[derive(Debug, Default)]
pub struct MetricsCrateRecorder {
    operations: AtomicU64,
    runs: AtomicU64,
    dispatches_succeeded: AtomicU64,
    dispatches_failed: AtomicU64,
    total_tokens: AtomicU64,
}

impl MetricsCrateRecorder {
    /// Recorder with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current totals
    pub fn snapshot(&self) -> RecorderSnapshot {
        RecorderSnapshot {
            operations: self.operations.load(Ordering::Relaxed),
            runs: self.runs.load(Ordering::Relaxed),
            dispatches_succeeded: self.dispatches_succeeded.load(Ordering::Relaxed),
            dispatches_failed: self.dispatches_failed.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn millis(value: u64) -> f64 {
    value as f64
}

impl MetricsRecorder for MetricsCrateRecorder {
    fn record_metric(&self, operation: &str, duration_ms: u64, metadata: &MetricMetadata) {
        self.operations.fetch_add(1, Ordering::Relaxed);

        let operation = operation.to_string();
        metrics::histogram!(OPERATION_DURATION, "operation" => operation.clone())
            .record(millis(duration_ms));
        metrics::counter!(OPERATIONS_TOTAL, "operation" => operation.clone()).increment(1);

        debug!(
            operation = %operation,
            duration_ms,
            metadata = %serde_json::Value::Object(metadata.clone()),
            "Metric recorded"
        );
    }

    fn record_multi_model_metrics(
        &self,
        request_id: &str,
        model_count: usize,
        total_duration_ms: u64,
        results: &[DispatchResult],
        metadata: &MetricMetadata,
    ) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        metrics::histogram!(RUN_DURATION).record(millis(total_duration_ms));
        metrics::counter!(RUNS_TOTAL).increment(1);

        let (mut succeeded, mut failed) = (0u64, 0u64);
        for result in results {
            let outcome = match result.failure_details() {
                None => "success".to_string(),
                Some(failure) => failure.kind.to_string(),
            };
            metrics::counter!(
                DISPATCHES_TOTAL,
                "model" => result.model_id.as_str().to_string(),
                "provider" => result.provider.clone(),
                "outcome" => outcome
            )
            .increment(1);

            if let Some(usage) = result.usage() {
                let tokens = u64::from(usage.total_tokens);
                metrics::counter!(TOKENS_TOTAL, "model" => result.model_id.as_str().to_string())
                    .increment(tokens);
                self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
            }
            if result.is_success() {
                succeeded += 1;
            } else {
                failed += 1;
            }
        }

        self.dispatches_succeeded
            .fetch_add(succeeded, Ordering::Relaxed);
        self.dispatches_failed.fetch_add(failed, Ordering::Relaxed);

        debug!(
            request_id,
            model_count,
            total_duration_ms,
            succeeded,
            failed,
            metadata = %serde_json::Value::Object(metadata.clone()),
            "Multi-model run recorded"
        );
    }
}

#[cfg(test)]
mod tests {
    use ai_core::{ChatCompletion, InferenceError, TokenUsage};
    use domain::ModelConfig;

    use super::*;

    fn success(id: &str, tokens: (u32, u32)) -> DispatchResult {
        DispatchResult::success(
            &ModelConfig::remote(id, "openai"),
            ChatCompletion {
                content: "ok".to_string(),
                model: id.to_string(),
                usage: Some(TokenUsage::new(tokens.0, tokens.1)),
                finish_reason: None,
            },
            20,
            1,
        )
    }

    #[test]
    fn record_metric_counts_operations() {
        let recorder = MetricsCrateRecorder::new();
        let mut metadata = MetricMetadata::new();
        metadata.insert("model_id".to_string(), "llama3".into());

        recorder.record_metric("model_dispatch", 12, &metadata);
        recorder.record_metric("coordination_overhead", 3, &MetricMetadata::new());

        assert_eq!(recorder.snapshot().operations, 2);
        assert_eq!(recorder.snapshot().runs, 0);
    }

    #[test]
    fn multi_model_run_totals() {
        let recorder = MetricsCrateRecorder::new();
        let results = vec![
            success("a", (10, 5)),
            DispatchResult::circuit_open(&ModelConfig::local("b")),
            DispatchResult::failure(
                &ModelConfig::local("c"),
                &InferenceError::Timeout(100),
                100,
                1,
            ),
            success("d", (1, 1)),
        ];

        recorder.record_multi_model_metrics("req-1", 4, 120, &results, &MetricMetadata::new());

        assert_eq!(
            recorder.snapshot(),
            RecorderSnapshot {
                operations: 0,
                runs: 1,
                dispatches_succeeded: 2,
                dispatches_failed: 2,
                total_tokens: 17,
            }
        );
    }
}
