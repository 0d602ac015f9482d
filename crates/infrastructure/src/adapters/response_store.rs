//! In-memory response persistence

use std::collections::HashMap;

use ai_core::{InferenceError, ResponsePersistence};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Lifecycle of a stored response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Placeholder created, stream still running
    Pending,
    /// Final content stored
    Complete,
    /// Stream failed before its terminal signal
    Failed,
}

/// A streamed response as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredResponse {
    /// Model that produced the response
    pub model_id: String,
    /// Accumulated content, partial unless `Complete`
    pub content: String,
    /// Token estimate, set on finalization
    pub token_estimate: u64,
    /// Current lifecycle state
    pub status: ResponseStatus,
    /// Failure reason for `Failed` records
    pub error: Option<String>,
}

/// `ResponsePersistence` keeping records in a map
#[derive(Debug, Default)]
pub struct InMemoryResponseStore {
    records: RwLock<HashMap<String, StoredResponse>>,
}

impl InMemoryResponseStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record by id
    pub fn get(&self, response_id: &str) -> Option<StoredResponse> {
        self.records.read().get(response_id).cloned()
    }

    /// Records currently in `status`
    pub fn with_status(&self, status: ResponseStatus) -> Vec<StoredResponse> {
        self.records
            .read()
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }

    /// Number of records, pending ones included
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no record exists
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ResponsePersistence for InMemoryResponseStore {
    #[instrument(skip(self))]
    async fn create_placeholder(&self, model_id: &str) -> Result<String, InferenceError> {
        let response_id = Uuid::now_v7().to_string();
        self.records.write().insert(
            response_id.clone(),
            StoredResponse {
                model_id: model_id.to_string(),
                content: String::new(),
                token_estimate: 0,
                status: ResponseStatus::Pending,
                error: None,
            },
        );
        debug!(response_id = %response_id, "Placeholder created");
        Ok(response_id)
    }

    #[instrument(skip(self, content), fields(content_len = content.len()))]
    async fn finalize(
        &self,
        response_id: &str,
        content: &str,
        token_estimate: u64,
    ) -> Result<(), InferenceError> {
        let mut records = self.records.write();
        let record = records.get_mut(response_id).ok_or_else(|| {
            InferenceError::Persistence(format!("unknown response id: {response_id}"))
        })?;
        content.clone_into(&mut record.content);
        record.token_estimate = token_estimate;
        record.status = ResponseStatus::Complete;
        drop(records);

        debug!("Response finalized");
        Ok(())
    }

    #[instrument(skip(self, partial_content), fields(content_len = partial_content.len()))]
    async fn mark_failed(
        &self,
        response_id: &str,
        partial_content: &str,
        reason: &str,
    ) -> Result<(), InferenceError> {
        let mut records = self.records.write();
        let record = records.get_mut(response_id).ok_or_else(|| {
            InferenceError::Persistence(format!("unknown response id: {response_id}"))
        })?;
        partial_content.clone_into(&mut record.content);
        record.status = ResponseStatus::Failed;
        record.error = Some(reason.to_string());
        drop(records);

        debug!("Response marked failed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn placeholder_then_finalize() {
        let store = InMemoryResponseStore::new();
        let id = store.create_placeholder("llama3").await.unwrap();

        let pending = store.get(&id).unwrap();
        assert_eq!(pending.status, ResponseStatus::Pending);
        assert!(pending.content.is_empty());

        store.finalize(&id, "Hello world", 3).await.unwrap();
        let done = store.get(&id).unwrap();
        assert_eq!(done.status, ResponseStatus::Complete);
        assert_eq!(done.content, "Hello world");
        assert_eq!(done.token_estimate, 3);
        assert_eq!(done.model_id, "llama3");
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let store = InMemoryResponseStore::new();
        let a = store.create_placeholder("m").await.unwrap();
        let b = store.create_placeholder("m").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn finalize_unknown_id_fails() {
        let store = InMemoryResponseStore::new();
        let err = store.finalize("missing", "x", 1).await.unwrap_err();
        assert!(matches!(err, InferenceError::Persistence(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failed_stream_leaves_failed_record() {
        let store = InMemoryResponseStore::new();
        let id = store.create_placeholder("llama3").await.unwrap();

        store
            .mark_failed(&id, "Hel", "model runner crashed")
            .await
            .unwrap();
        let failed = store.get(&id).unwrap();
        assert_eq!(failed.status, ResponseStatus::Failed);
        assert_eq!(failed.content, "Hel");
        assert_eq!(failed.token_estimate, 0);
        assert_eq!(failed.error.as_deref(), Some("model runner crashed"));

        assert_eq!(store.with_status(ResponseStatus::Failed).len(), 1);
        assert!(store.with_status(ResponseStatus::Pending).is_empty());

        let err = store.mark_failed("missing", "", "x").await.unwrap_err();
        assert!(matches!(err, InferenceError::Persistence(_)));
    }
}
