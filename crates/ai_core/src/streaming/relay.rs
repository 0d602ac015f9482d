//! Relay from a backend byte stream to uniform [`StreamEvent`]s
//!
//! Drives a [`StreamTranslator`] over the HTTP body and invokes the
//! response-persistence hook: a placeholder on the first content chunk,
//! finalization on the terminal signal only. Transport errors, in-stream
//! backend errors and a body cut short all end in one `Error` event.

use std::{fmt, sync::Arc};

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use super::translator::{StreamState, StreamTranslator, Translated, WireFormat, estimate_tokens};
use crate::ports::{DeltaStream, ResponsePersistence, StreamEvent};

const UNTERMINATED: &str = "stream ended without terminal signal";

/// Turns one backend body into a [`DeltaStream`]
#[derive(Clone)]
pub struct StreamRelay {
    translator: StreamTranslator,
    model_id: String,
    persistence: Option<Arc<dyn ResponsePersistence>>,
}

impl fmt::Debug for StreamRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRelay")
            .field("translator", &self.translator)
            .field("model_id", &self.model_id)
            .field("persistence", &self.persistence.is_some())
            .finish()
    }
}

impl StreamRelay {
    /// Relay for one model's stream
    pub fn new(format: WireFormat, model_id: impl Into<String>) -> Self {
        Self {
            translator: StreamTranslator::new(format),
            model_id: model_id.into(),
            persistence: None,
        }
    }

    /// Attach a response-persistence hook
    #[must_use]
    pub fn with_persistence(mut self, persistence: Option<Arc<dyn ResponsePersistence>>) -> Self {
        self.persistence = persistence;
        self
    }

    /// Relay `body`, ending with exactly one terminal event
    pub fn relay<S, E>(self, body: S) -> DeltaStream
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        Box::pin(stream! {
            let mut body = Box::pin(body);
            let mut state = StreamState::new();

            loop {
                let (translated, at_end) = match body.next().await {
                    Some(Ok(chunk)) => (self.translator.push(&mut state, &chunk), false),
                    Some(Err(err)) => {
                        warn!(model = %self.model_id, error = %err, "Stream transport error");
                        yield self.fail(&state, err.to_string()).await;
                        return;
                    },
                    None => (self.translator.finish(&mut state), true),
                };

                for item in translated {
                    match item {
                        Translated::Delta(content) => {
                            self.ensure_placeholder(&mut state).await;
                            yield StreamEvent::Delta { content };
                        },
                        Translated::Terminal => {
                            yield self.complete(&state).await;
                            return;
                        },
                        Translated::Error(message) => {
                            yield self.fail(&state, message).await;
                            return;
                        },
                    }
                }

                if at_end {
                    warn!(model = %self.model_id, "Stream ended without terminal signal");
                    yield self.fail(&state, UNTERMINATED.to_string()).await;
                    return;
                }
            }
        })
    }

    async fn ensure_placeholder(&self, state: &mut StreamState) {
        if state.placeholder_requested {
            return;
        }
        state.placeholder_requested = true;

        let Some(persistence) = &self.persistence else {
            return;
        };
        match persistence.create_placeholder(&self.model_id).await {
            Ok(id) => {
                debug!(model = %self.model_id, response_id = %id, "Created response placeholder");
                state.response_id = Some(id);
            },
            Err(e) => {
                warn!(model = %self.model_id, error = %e, "Failed to create response placeholder");
            },
        }
    }

    async fn complete(&self, state: &StreamState) -> StreamEvent {
        if let (Some(persistence), Some(id)) = (&self.persistence, state.response_id()) {
            let tokens = estimate_tokens(state.content());
            if let Err(e) = persistence.finalize(id, state.content(), tokens).await {
                warn!(
                    model = %self.model_id,
                    response_id = %id,
                    error = %e,
                    "Failed to finalize response"
                );
            }
        }

        StreamEvent::Done {
            response_id: state.response_id().map(ToString::to_string),
            content: state.content().to_string(),
        }
    }

    async fn fail(&self, state: &StreamState, message: String) -> StreamEvent {
        if let (Some(persistence), Some(id)) = (&self.persistence, state.response_id()) {
            if let Err(e) = persistence.mark_failed(id, state.content(), &message).await {
                warn!(
                    model = %self.model_id,
                    response_id = %id,
                    error = %e,
                    "Failed to mark response as failed"
                );
            }
        }

        StreamEvent::Error { message }
    }
}
