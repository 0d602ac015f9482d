//! Domain layer for the inference gateway
//!
//! Contains the data model shared by provider adapters and the request
//! coordinator: conversation messages, model configuration and provider kinds.
//! This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
