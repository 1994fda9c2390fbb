//! Client wire protocol
//!
//! JSON control messages exchanged over the WebSocket connection, plus the
//! outbound frame type the orchestrator hands to the transport layer. Audio
//! travels as binary frames in both directions.

use serde::{Deserialize, Serialize};

/// Inbound control messages (client → session)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Barge-in: abandon the in-flight response
    Interrupt,
    /// Tear down the session immediately
    StopConversation,
    /// Keepalive
    Ping,
    /// Audio fallback for clients that cannot send binary frames
    Audio { data: String },
}

/// Outbound events (session → client)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Session initialized; nothing is processed before this
    Ready,
    /// Every STT event, interim or final
    Transcript {
        text: String,
        #[serde(rename = "isFinal")]
        is_final: bool,
    },
    /// Queue was full; the transcript was dropped
    Busy { message: String },
    /// Queue at or above 80% capacity
    ProcessingLoad {
        #[serde(rename = "queueSize")]
        queue_size: usize,
    },
    /// Interrupt received and handled
    InterruptAck { message: String },
    /// One streamed text chunk of the assistant's reply
    AiChunk { text: String },
    /// Assistant finished speaking (omitted if interrupted)
    AiDone,
    /// Non-fatal unless sent at session start
    Error { message: String },
    /// Keepalive reply
    Pong,
}

/// One outbound frame: a JSON event or a synthesized audio chunk.
///
/// The transport pump serializes events and forwards audio as binary.
#[derive(Debug, Clone)]
pub enum Outbound {
    Event(ServerEvent),
    Audio(Vec<u8>),
}

impl From<ServerEvent> for Outbound {
    fn from(event: ServerEvent) -> Self {
        Outbound::Event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd: ClientCommand = serde_json::from_str(r#"{"type":"interrupt"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Interrupt));

        let cmd: ClientCommand = serde_json::from_str(r#"{"type":"stop_conversation"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::StopConversation));
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_string(&ServerEvent::Transcript {
            text: "hello".into(),
            is_final: true,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"transcript","text":"hello","isFinal":true}"#);

        let json = serde_json::to_string(&ServerEvent::ProcessingLoad { queue_size: 4 }).unwrap();
        assert_eq!(json, r#"{"type":"processing_load","queueSize":4}"#);

        let json = serde_json::to_string(&ServerEvent::AiDone).unwrap();
        assert_eq!(json, r#"{"type":"ai_done"}"#);
    }
}
