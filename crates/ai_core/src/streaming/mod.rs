//! Translation of backend streaming formats into [`StreamEvent`]s
//!
//! [`StreamEvent`]: crate::ports::StreamEvent

mod relay;
mod translator;

pub use relay::StreamRelay;
pub use translator::{StreamState, StreamTranslator, Translated, WireFormat, estimate_tokens};
