//! Configuration-driven wiring of registry, factory, coordinator and adapters

use std::{io::Write, sync::Arc};

use ai_core::{ProviderFactory, StreamEvent};
use domain::ConversationMessage;
use futures::StreamExt;
use infrastructure::{
    AppConfig, ConfigModelRegistry, InMemoryResponseStore, MetricsCrateRecorder,
    adapters::ResponseStatus,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

// =============================================================================
// Test Helpers
// =============================================================================

fn config_for(server: &MockServer) -> (AppConfig, tempfile::NamedTempFile) {
    let contents = format!(
        r#"
[providers.ollama]
base_url = "{uri}"

[providers.openai]
base_url = "{uri}/v1"
api_key = "sk-wiring"

[[models]]
id = "llama3"
provider = "ollama"

[[models]]
id = "gpt-4o"
provider = "openai"

[retry]
max_attempts = 2
base_delay_ms = 5
max_delay_ms = 10
"#,
        uri = server.uri()
    );
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    let config = AppConfig::load_from(file.path()).unwrap();
    (config, file)
}

fn conversation() -> Vec<ConversationMessage> {
    vec![ConversationMessage::user("Hello")]
}

async fn mount_backends(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "llama3",
            "message": {"role": "assistant", "content": "local answer"},
            "done": true,
            "prompt_eval_count": 10,
            "eval_count": 5
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-wiring"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "remote answer"}}],
            "usage": {"prompt_tokens": 8, "completion_tokens": 4, "total_tokens": 12}
        })))
        .expect(1)
        .mount(server)
        .await;
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn configured_models_are_coordinated_and_recorded() {
    let server = MockServer::start().await;
    mount_backends(&server).await;
    let (config, _file) = config_for(&server);

    let registry = ConfigModelRegistry::from_config(&config);
    let ids = vec!["llama3".to_string(), "gpt-4o".to_string()];
    let models = ProviderFactory::resolve_models(&registry, &ids).await.unwrap();

    let recorder = Arc::new(MetricsCrateRecorder::new());
    let factory = Arc::new(ProviderFactory::new(config.providers.clone()).unwrap());
    let coordinator = factory
        .create_multi_model(models, config.coordinator_config())
        .unwrap()
        .with_metrics(recorder.clone());

    let response = coordinator
        .execute(&conversation(), &config.request_options())
        .await
        .unwrap();

    assert_eq!(response.successful_models, 2);
    assert!(response.content.contains("local answer"));
    assert!(response.content.contains("remote answer"));
    assert_eq!(response.usage.total_tokens, 27);

    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.runs, 1);
    assert_eq!(snapshot.dispatches_succeeded, 2);
    assert_eq!(snapshot.dispatches_failed, 0);
    assert_eq!(snapshot.total_tokens, 27);
    assert!(snapshot.operations >= 2);
}

#[tokio::test]
async fn unknown_model_id_fails_resolution() {
    let server = MockServer::start().await;
    let (config, _file) = config_for(&server);
    let registry = ConfigModelRegistry::from_config(&config);

    let ids = vec!["llama3".to_string(), "claude".to_string()];
    let err = ProviderFactory::resolve_models(&registry, &ids)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("claude"));
}

#[tokio::test]
async fn streamed_response_is_persisted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"models": [{"name": "llama3:latest"}]})),
        )
        .mount(&server)
        .await;
    let body = [
        r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#,
        r#"{"message":{"role":"assistant","content":"lo"},"done":false}"#,
        r#"{"message":{"role":"assistant","content":""},"done":true}"#,
    ]
    .join("\n")
        + "\n";
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .expect(1)
        .mount(&server)
        .await;

    let (config, _file) = config_for(&server);
    let store = Arc::new(InMemoryResponseStore::new());
    let factory = Arc::new(
        ProviderFactory::new(config.providers.clone())
            .unwrap()
            .with_persistence(store.clone()),
    );
    let coordinator = factory
        .create_multi_model(config.models.clone(), config.coordinator_config())
        .unwrap();

    let stream = coordinator
        .stream_single(&config.models[0], &conversation(), &config.request_options())
        .await
        .unwrap();
    let events: Vec<StreamEvent> = stream.collect().await;

    let Some(StreamEvent::Done {
        response_id: Some(response_id),
        content,
    }) = events.last()
    else {
        panic!("stream did not finish with a persisted Done event: {events:?}");
    };
    assert_eq!(content, "Hello");

    let stored = store.get(response_id).unwrap();
    assert_eq!(stored.status, ResponseStatus::Complete);
    assert_eq!(stored.content, "Hello");
    assert_eq!(stored.token_estimate, 2);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn backend_error_mid_stream_leaves_failed_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"models": [{"name": "llama3:latest"}]})),
        )
        .mount(&server)
        .await;
    let body = [
        r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#,
        r#"{"error":"model runner crashed"}"#,
    ]
    .join("\n")
        + "\n";
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .expect(1)
        .mount(&server)
        .await;

    let (config, _file) = config_for(&server);
    let store = Arc::new(InMemoryResponseStore::new());
    let factory = Arc::new(
        ProviderFactory::new(config.providers.clone())
            .unwrap()
            .with_persistence(store.clone()),
    );
    let coordinator = factory
        .create_multi_model(config.models.clone(), config.coordinator_config())
        .unwrap();

    let stream = coordinator
        .stream_single(&config.models[0], &conversation(), &config.request_options())
        .await
        .unwrap();
    let events: Vec<StreamEvent> = stream.collect().await;

    assert_eq!(
        events.last(),
        Some(&StreamEvent::Error {
            message: "model runner crashed".into()
        })
    );
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, StreamEvent::Done { .. }))
    );

    assert_eq!(store.len(), 1);
    assert!(store.with_status(ResponseStatus::Complete).is_empty());
    let failed = store.with_status(ResponseStatus::Failed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].content, "Hel");
    assert_eq!(failed[0].error.as_deref(), Some("model runner crashed"));
}
