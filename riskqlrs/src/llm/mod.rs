//! Chat-completion clients used by the LLM-assisted generators.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

mod openai;

pub use openai::OpenAiCompatClient;

/// Chat-completion endpoints the selector knows how to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// The hosted OpenAI API, also serving fine-tuned models.
    OpenAi,
    /// An OpenAI-compatible local server such as Ollama.
    Local,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => f.write_str("openai"),
            Provider::Local => f.write_str("local"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Outcome of a successful availability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Model the generators should request from this provider.
    pub model: String,
    /// Models the server reported, when it lists them.
    pub models: Vec<String>,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Send one chat request and return the first choice's message text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Check that the provider is reachable and usable.
    async fn probe(&self) -> Result<ProbeReport>;
}
