//! Provider kind value object

use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend family a model is served by
///
/// `Local` is an Ollama-style server speaking newline-delimited JSON.
/// Every other tag is treated as a generic OpenAI-compatible backend and
/// keeps its name so provider-scoped configuration can be looked up by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderKind {
    /// Ollama-compatible local inference server
    Local,
    /// OpenAI-compatible remote API, identified by its provider name
    Remote(String),
}

const LOCAL_TAGS: &[&str] = &["local", "ollama"];
const DEFAULT_REMOTE: &str = "openai";

impl ProviderKind {
    /// Parse a provider tag; unrecognized tags map to `Remote`
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim().to_lowercase();
        if LOCAL_TAGS.contains(&tag.as_str()) {
            Self::Local
        } else if tag.is_empty() {
            Self::Remote(DEFAULT_REMOTE.to_string())
        } else {
            Self::Remote(tag)
        }
    }

    /// Name under which provider-scoped configuration is stored
    pub fn config_key(&self) -> &str {
        match self {
            Self::Local => "ollama",
            Self::Remote(name) => name,
        }
    }

    /// Whether this is the local (Ollama-style) backend
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote(name) => f.write_str(name),
        }
    }
}

impl From<String> for ProviderKind {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<&str> for ProviderKind {
    fn from(tag: &str) -> Self {
        Self::parse(tag)
    }
}

impl From<ProviderKind> for String {
    fn from(kind: ProviderKind) -> Self {
        kind.to_string()
    }
}
