//! Core traits and types for the voicebridge orchestrator
//!
//! This crate provides foundational types used across all other crates:
//! - Adapter traits for pluggable providers (STT, TTS, chat completion)
//! - The client wire protocol (control commands and server events)
//! - Transcript and conversation context types
//! - Error types

pub mod context;
pub mod error;
pub mod llm_types;
pub mod message;
pub mod traits;
pub mod transcript;

pub use context::ConversationContext;
pub use error::{Error, Result};
pub use llm_types::{FinishReason, GenerateRequest, Message, Role, StreamChunk};
pub use message::{ClientCommand, Outbound, ServerEvent};
pub use transcript::{TranscriptEntry, TranscriptEvent};

// Trait re-exports
pub use traits::{
    ChatCompletion, ChatStream, SpeechToText, SttEvent, SttSession, SttSessionConfig,
    TextToSpeech, TtsEvent, TtsSession, TtsSessionConfig, TtsSessionState,
};
