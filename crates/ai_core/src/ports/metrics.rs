//! Metrics sink port

#[cfg(test)]
use mockall::automock;

use crate::coordinator::DispatchResult;

/// Free-form metadata attached to every metric
pub type MetricMetadata = serde_json::Map<String, serde_json::Value>;

/// Receives timing data from the coordinator
///
/// Calls are synchronous and must not block; implementations typically
/// forward to a metrics facade or a channel.
#[cfg_attr(test, automock)]
pub trait MetricsRecorder: Send + Sync {
    /// Record the duration of one operation
    fn record_metric(&self, operation: &str, duration_ms: u64, metadata: &MetricMetadata);

    /// Record one multi-model coordination run
    fn record_multi_model_metrics(
        &self,
        request_id: &str,
        model_count: usize,
        total_duration_ms: u64,
        results: &[DispatchResult],
        metadata: &MetricMetadata,
    );
}
