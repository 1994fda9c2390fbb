//! Adapter traits for pluggable providers
//!
//! Every external engine is modeled as message-passing: opening a session
//! returns a command handle plus a typed event receiver the session consumes
//! in its own task. No callback subscriptions, no reentrancy.

mod chat;
mod speech;

pub use chat::{ChatCompletion, ChatStream};
pub use speech::{
    SpeechToText, SttEvent, SttSession, SttSessionConfig, TextToSpeech, TtsEvent, TtsSession,
    TtsSessionConfig, TtsSessionState,
};
