//! Chat-completion integration
//!
//! Streaming chat backends behind the core `ChatCompletion` trait:
//! - `OpenAiChatBackend` - OpenAI-compatible `/chat/completions` SSE
//!   streaming (also covers Ollama and most hosted gateways)
//! - `ChatFactory` - builds a per-tenant backend from platform defaults and
//!   tenant credentials

pub mod backend;
pub mod factory;

pub use backend::{OpenAiChatBackend, OpenAiConfig};
pub use factory::ChatFactory;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for voicebridge_core::Error {
    fn from(err: LlmError) -> Self {
        voicebridge_core::Error::Chat(err.to_string())
    }
}
