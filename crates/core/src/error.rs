//! Error types shared across the orchestrator crates

use thiserror::Error;

/// Core error type.
///
/// Adapter implementations wrap engine failures in the matching variant;
/// the pipeline converts them into utterance-scoped failures at the
/// boundary where they occur.
#[derive(Error, Debug)]
pub enum Error {
    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Chat completion error: {0}")]
    Chat(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Core result type
pub type Result<T> = std::result::Result<T, Error>;
