//! Chat-completion trait

use futures::Stream;
use std::pin::Pin;

use crate::llm_types::{GenerateRequest, StreamChunk};
use crate::Result;

/// Boxed stream of chat-completion chunks
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Streaming chat-completion backend.
///
/// Each call produces a fresh, lazy, ordered stream of text chunks. Streams
/// are restartable per call but not resumable mid-stream; abandoning the
/// stream drops the underlying request.
pub trait ChatCompletion: Send + Sync + 'static {
    /// Start one streaming completion
    fn generate_stream(&self, request: GenerateRequest) -> ChatStream;

    /// Model name for logging
    fn model_name(&self) -> &str;
}
