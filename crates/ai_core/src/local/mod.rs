//! Local (Ollama-compatible) provider adapter

mod client;

pub use client::LocalProvider;
