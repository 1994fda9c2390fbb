//! Per-session conversation pipeline
//!
//! One pipeline instance runs per client connection and owns the serialized
//! path from finalized transcripts to streamed replies:
//!
//! ```text
//! STT events → TranscriptQueue → InterruptController gate
//!            → ResponseCoordinator → (client text, TTS audio)
//! ```
//!
//! The [`SessionOrchestrator`] wires the pieces together and drives the
//! drain loop; the server crate feeds it STT events and client commands.

pub mod adapters;
pub mod coordinator;
pub mod interrupt;
pub mod orchestrator;
pub mod queue;
pub mod tts_slot;

pub use coordinator::{ResponseCoordinator, UtteranceOutcome};
pub use interrupt::{InterruptController, InterruptPhase};
pub use orchestrator::{SessionOrchestrator, SessionPipelineConfig};
pub use queue::{EnqueueOutcome, TranscriptQueue};
pub use tts_slot::TtsHandleSlot;

use std::time::Duration;
use thiserror::Error;

/// Pipeline errors. All variants are utterance-scoped: the session survives
/// and continues draining the queue.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Speech output failed to start within {0:?}")]
    TtsOpenTimeout(Duration),

    #[error("Speech output failed to stop within {0:?}")]
    TtsCloseTimeout(Duration),

    #[error("Speech output error: {0}")]
    Tts(String),

    #[error("Reply generation failed: {0}")]
    Chat(String),

    #[error("Client connection closed")]
    OutboundClosed,
}
