//! Transcript types

use serde::{Deserialize, Serialize};

/// A transcript event from the STT adapter, interim or final.
///
/// Interim events are display-only; they are forwarded to the client and
/// never queued. Final events become [`TranscriptEntry`] values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// Transcribed text
    pub text: String,
    /// True when the STT engine marked this utterance complete
    pub is_final: bool,
}

impl TranscriptEvent {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// One finalized user utterance, as held by the transcript queue.
///
/// Constructed only from final transcript events; consumed and discarded by
/// the processing loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Finalized utterance text
    pub text: String,
}

impl TranscriptEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<TranscriptEvent> for TranscriptEntry {
    fn from(event: TranscriptEvent) -> Self {
        debug_assert!(event.is_final, "only final transcripts are queued");
        Self { text: event.text }
    }
}
