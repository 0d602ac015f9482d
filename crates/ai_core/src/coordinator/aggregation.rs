//! Folding per-model results into one logical response

use std::fmt::Write as _;

use serde::Serialize;

use super::dispatch::DispatchResult;
use crate::{options::AggregationStrategy, ports::TokenUsage};

/// Result of one coordinator run
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResponse {
    /// Request identifier (caller-supplied or generated)
    pub request_id: String,
    /// Strategy used to build `content`
    pub strategy: AggregationStrategy,
    /// Combined content
    pub content: String,
    /// One entry per input model, in input order
    pub results: Vec<DispatchResult>,
    /// Summed token usage of successful models
    pub usage: TokenUsage,
    /// Summed cost of successful models
    pub total_cost: f64,
    /// Models that answered
    pub successful_models: usize,
    /// Models that failed (circuit-open included)
    pub failed_models: usize,
    /// Wall time of the whole run
    pub total_duration_ms: u64,
    /// Time not attributable to any single model, when positive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordination_overhead_ms: Option<u64>,
}

impl AggregatedResponse {
    /// Fold `results` according to `strategy`
    pub fn build(
        request_id: String,
        strategy: AggregationStrategy,
        results: Vec<DispatchResult>,
        total_duration_ms: u64,
    ) -> Self {
        let successful_models = results.iter().filter(|r| r.is_success()).count();
        let failed_models = results.len() - successful_models;

        let mut usage = TokenUsage::default();
        for result_usage in results.iter().filter_map(DispatchResult::usage) {
            usage += result_usage;
        }
        let total_cost = results.iter().filter_map(|r| r.cost).sum();

        let individual: u64 = results.iter().map(|r| r.duration_ms).sum();
        let coordination_overhead_ms = total_duration_ms
            .checked_sub(individual)
            .filter(|overhead| *overhead > 0);

        let content = match strategy {
            AggregationStrategy::CombineAll => combine_all(&results),
            AggregationStrategy::FirstSuccess => results
                .iter()
                .find_map(DispatchResult::content)
                .unwrap_or_default()
                .to_string(),
            AggregationStrategy::Fastest => results
                .iter()
                .filter(|r| r.is_success())
                .min_by_key(|r| r.duration_ms)
                .and_then(DispatchResult::content)
                .unwrap_or_default()
                .to_string(),
        };

        Self {
            request_id,
            strategy,
            content,
            results,
            usage,
            total_cost,
            successful_models,
            failed_models,
            total_duration_ms,
            coordination_overhead_ms,
        }
    }

    /// Whether at least one model answered
    pub const fn has_success(&self) -> bool {
        self.successful_models > 0
    }
}

/// One attributed section per successful model, in input order
fn combine_all(results: &[DispatchResult]) -> String {
    let mut combined = String::new();
    for result in results {
        let Some(content) = result.content() else {
            continue;
        };
        if !combined.is_empty() {
            combined.push_str("\n\n");
        }
        let _ = write!(
            combined,
            "[{} ({}, {} ms)]\n{}",
            result.model_id, result.provider, result.duration_ms, content
        );
    }
    combined
}

#[cfg(test)]
mod tests {
    use domain::{ModelConfig, ModelPricing};

    use super::*;
    use crate::{error::InferenceError, ports::ChatCompletion};

    fn ok(id: &str, content: &str, duration_ms: u64) -> DispatchResult {
        let model = ModelConfig::remote(id, "openai").with_pricing(ModelPricing::new(1.0, 1.0));
        DispatchResult::success(
            &model,
            ChatCompletion {
                content: content.to_string(),
                model: id.to_string(),
                usage: Some(TokenUsage::new(500, 500)),
                finish_reason: None,
            },
            duration_ms,
            1,
        )
    }

    fn failed(id: &str, duration_ms: u64) -> DispatchResult {
        DispatchResult::failure(
            &ModelConfig::local(id),
            &InferenceError::ServerError {
                status: 503,
                message: String::new(),
            },
            duration_ms,
            1,
        )
    }

    #[test]
    fn combine_all_attributes_in_input_order() {
        let response = AggregatedResponse::build(
            "req".to_string(),
            AggregationStrategy::CombineAll,
            vec![ok("b", "second", 20), failed("x", 5), ok("a", "first", 10)],
            25,
        );
        assert_eq!(
            response.content,
            "[b (openai, 20 ms)]\nsecond\n\n[a (openai, 10 ms)]\nfirst"
        );
        assert_eq!(response.successful_models, 2);
        assert_eq!(response.failed_models, 1);
        assert_eq!(response.usage, TokenUsage::new(1000, 1000));
        assert!((response.total_cost - 2.0).abs() < 1e-9);
    }

    #[test]
    fn first_success_and_fastest() {
        let results = vec![failed("x", 1), ok("slow", "slow answer", 30), ok("quick", "quick answer", 10)];
        let first = AggregatedResponse::build(
            "r".to_string(),
            AggregationStrategy::FirstSuccess,
            results.clone(),
            30,
        );
        assert_eq!(first.content, "slow answer");

        let fastest = AggregatedResponse::build("r".to_string(), AggregationStrategy::Fastest, results, 30);
        assert_eq!(fastest.content, "quick answer");
    }

    #[test]
    fn all_failed_still_aggregates() {
        let response = AggregatedResponse::build(
            "r".to_string(),
            AggregationStrategy::CombineAll,
            vec![failed("a", 1), failed("b", 2)],
            3,
        );
        assert_eq!(response.successful_models, 0);
        assert_eq!(response.failed_models, 2);
        assert!(response.content.is_empty());
        assert!(!response.has_success());
    }

    #[test]
    fn overhead_only_when_positive() {
        let concurrent = AggregatedResponse::build(
            "r".to_string(),
            AggregationStrategy::CombineAll,
            vec![ok("a", "x", 100), ok("b", "y", 100)],
            110,
        );
        assert_eq!(concurrent.coordination_overhead_ms, None);

        let exact = AggregatedResponse::build(
            "r".to_string(),
            AggregationStrategy::CombineAll,
            vec![ok("a", "x", 50)],
            50,
        );
        assert_eq!(exact.coordination_overhead_ms, None);

        let sequential = AggregatedResponse::build(
            "r".to_string(),
            AggregationStrategy::CombineAll,
            vec![ok("a", "x", 40), ok("b", "y", 40)],
            95,
        );
        assert_eq!(sequential.coordination_overhead_ms, Some(15));
    }
}
