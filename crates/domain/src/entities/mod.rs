//! Domain entities

mod conversation_message;
mod model_config;

pub use conversation_message::{ConversationMessage, MessageRole};
pub use model_config::{ModelCapabilities, ModelConfig, ModelPricing};
