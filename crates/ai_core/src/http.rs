//! HTTP plumbing shared by the provider adapters

use std::time::Duration;

use domain::ConversationMessage;
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::warn;

use crate::error::InferenceError;

/// Connect timeout for every backend
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for health checks and model listings
pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the HTTP client shared by all adapters of a factory
pub(crate) fn build_client() -> Result<Client, InferenceError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| InferenceError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Pass successful responses through, map the rest to an error
pub(crate) async fn ensure_success(response: Response) -> Result<Response, InferenceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, body = %body, "Provider request failed");
    Err(InferenceError::from_status(status, &body))
}

/// Role/content pair as both backend families expect it
#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

pub(crate) fn wire_messages(messages: &[ConversationMessage]) -> Vec<WireMessage<'_>> {
    messages
        .iter()
        .map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_messages_keep_order() {
        let messages = vec![
            ConversationMessage::system("Be brief"),
            ConversationMessage::user("Hi"),
        ];
        let json = serde_json::to_value(wire_messages(&messages)).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "system", "content": "Be brief"},
                {"role": "user", "content": "Hi"}
            ])
        );
    }

    #[test]
    fn client_builds() {
        assert!(build_client().is_ok());
    }
}
