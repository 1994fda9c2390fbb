//! Speech adapter traits
//!
//! Contracts for the streaming STT and TTS engines. Vendor wire protocols
//! live behind these traits; the orchestrator only sees typed events.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::transcript::TranscriptEvent;
use crate::Result;

// =============================================================================
// Speech-to-Text
// =============================================================================

/// Per-session STT configuration, resolved from the tenant profile.
#[derive(Debug, Clone)]
pub struct SttSessionConfig {
    /// Provider API key
    pub api_key: String,
    /// BCP-47 language tag
    pub language: String,
    /// Input sample rate in Hz
    pub sample_rate: u32,
    /// Provider endpoint override
    pub endpoint: Option<String>,
}

impl Default for SttSessionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            language: "en-US".to_string(),
            sample_rate: 16_000,
            endpoint: None,
        }
    }
}

/// Events emitted by an open STT session
#[derive(Debug, Clone)]
pub enum SttEvent {
    /// Interim or final transcript for appended audio
    Transcript(TranscriptEvent),
    /// Engine-side error; the session may still deliver further events
    Error(String),
    /// The engine closed the stream; no further events follow
    Closed,
}

/// Command handle for one open STT stream
#[async_trait]
pub trait SttSession: Send + Sync + 'static {
    /// Append raw audio to the stream
    async fn send_audio(&self, pcm: Vec<u8>) -> Result<()>;

    /// Close the stream; the engine acknowledges with [`SttEvent::Closed`]
    async fn close(&self);
}

/// Speech-to-Text engine factory
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Open one streaming transcription session.
    ///
    /// Returns the command handle and the event receiver the session task
    /// drains. Event ordering matches engine emission order.
    async fn open_session(
        &self,
        config: &SttSessionConfig,
    ) -> Result<(Arc<dyn SttSession>, mpsc::Receiver<SttEvent>)>;

    /// Provider name for logging
    fn provider_name(&self) -> &str;
}

// =============================================================================
// Text-to-Speech
// =============================================================================

/// Per-session TTS configuration, resolved from the tenant profile.
#[derive(Debug, Clone)]
pub struct TtsSessionConfig {
    /// Provider API key
    pub api_key: String,
    /// Voice identifier
    pub voice_id: Option<String>,
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Provider endpoint override
    pub endpoint: Option<String>,
}

impl Default for TtsSessionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: None,
            sample_rate: 24_000,
            endpoint: None,
        }
    }
}

/// Lifecycle state of a TTS session, observable through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsSessionState {
    /// Connection requested, not yet ready for text
    Connecting,
    /// Ready: text may be sent, audio events flow
    Open,
    /// Closed by either side; the handle is dead
    Closed,
}

/// Events emitted by an open TTS session.
///
/// Open/close transitions are signaled through the state watch, not the
/// event channel, so lifecycle waits compose with `tokio::time::timeout`.
#[derive(Debug, Clone)]
pub enum TtsEvent {
    /// One synthesized audio chunk
    Audio(Vec<u8>),
    /// Engine-side error for this session
    Error(String),
}

/// Command handle for one open TTS stream.
///
/// Owned by the response coordinator for exactly one assistant response.
#[async_trait]
pub trait TtsSession: Send + Sync + 'static {
    /// Send a text chunk for synthesis
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Signal "no more text, finish speaking"; resolves once the engine has
    /// flushed all pending synthesis
    async fn flush(&self) -> Result<()>;

    /// Request close without waiting for confirmation. Idempotent; safe to
    /// call from the interrupt path while a send is in flight.
    fn request_close(&self);

    /// Watch the session lifecycle state
    fn state(&self) -> watch::Receiver<TtsSessionState>;
}

/// Text-to-Speech engine factory
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Open one streaming synthesis session in `Connecting` state.
    ///
    /// Readiness is observed by waiting for [`TtsSessionState::Open`] on the
    /// handle's state watch.
    async fn open_session(
        &self,
        config: &TtsSessionConfig,
    ) -> Result<(Arc<dyn TtsSession>, mpsc::Receiver<TtsEvent>)>;

    /// Provider name for logging
    fn provider_name(&self) -> &str;
}
