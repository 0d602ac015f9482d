//! Value Objects - Immutable, identity-less domain primitives

mod model_id;
mod provider_kind;

pub use model_id::ModelId;
pub use provider_kind::ProviderKind;
