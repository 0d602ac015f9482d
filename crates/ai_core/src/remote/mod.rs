//! Remote (OpenAI-compatible) provider adapter

mod client;

pub use client::RemoteProvider;
