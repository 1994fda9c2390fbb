//! Local adapters
//!
//! In-process implementations of the provider traits, used for development
//! without vendor credentials and as test doubles. Vendor-backed adapters
//! implement the same traits in their own crates and plug in unchanged.
//!
//! - [`SilenceTts`] - synthesizes silence, with configurable open/close
//!   latency so lifecycle bounds can be exercised
//! - [`CannedChat`] - streams scripted replies word by word
//! - [`EchoChat`] - echoes the user's utterance back, for local demos
//! - [`NullSpeechToText`] - accepts audio, never transcribes
//! - [`ChannelSpeechToText`] - lets a test inject transcript events

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

use voicebridge_core::{
    ChatCompletion, ChatStream, Error as CoreError, FinishReason, GenerateRequest,
    Result as CoreResult, Role, SpeechToText, StreamChunk, SttEvent, SttSession, SttSessionConfig,
    TextToSpeech, TtsEvent, TtsSession, TtsSessionConfig, TtsSessionState,
};

// =============================================================================
// Silence TTS
// =============================================================================

/// Timing knobs for the silence engine.
#[derive(Debug, Clone)]
pub struct SilenceTtsOptions {
    /// Delay before the session reports `Open`
    pub open_delay: Duration,
    /// Delay between a close request and the `Closed` transition
    pub close_delay: Duration,
    /// Silence bytes emitted per word of input text
    pub bytes_per_word: usize,
}

impl Default for SilenceTtsOptions {
    fn default() -> Self {
        Self {
            open_delay: Duration::from_millis(10),
            close_delay: Duration::from_millis(10),
            bytes_per_word: 640,
        }
    }
}

/// TTS engine that emits silence instead of speech.
pub struct SilenceTts {
    options: SilenceTtsOptions,
}

impl SilenceTts {
    pub fn new(options: SilenceTtsOptions) -> Self {
        Self { options }
    }
}

impl Default for SilenceTts {
    fn default() -> Self {
        Self::new(SilenceTtsOptions::default())
    }
}

enum SessionCmd {
    Text(String),
    Flush(oneshot::Sender<()>),
}

struct SilenceSession {
    cmd_tx: mpsc::Sender<SessionCmd>,
    close_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<TtsSessionState>,
}

#[async_trait]
impl TtsSession for SilenceSession {
    async fn send_text(&self, text: &str) -> CoreResult<()> {
        self.cmd_tx
            .send(SessionCmd::Text(text.to_string()))
            .await
            .map_err(|_| CoreError::Tts("session closed".to_string()))
    }

    async fn flush(&self) -> CoreResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCmd::Flush(ack_tx))
            .await
            .map_err(|_| CoreError::Tts("session closed".to_string()))?;
        ack_rx
            .await
            .map_err(|_| CoreError::Tts("session closed during flush".to_string()))
    }

    fn request_close(&self) {
        self.close_tx.send_replace(true);
    }

    fn state(&self) -> watch::Receiver<TtsSessionState> {
        self.state_rx.clone()
    }
}

async fn silence_engine(
    options: SilenceTtsOptions,
    event_tx: mpsc::Sender<TtsEvent>,
    state_tx: watch::Sender<TtsSessionState>,
    mut cmd_rx: mpsc::Receiver<SessionCmd>,
    mut close_rx: watch::Receiver<bool>,
) {
    tokio::time::sleep(options.open_delay).await;
    state_tx.send_replace(TtsSessionState::Open);

    loop {
        tokio::select! {
            changed = close_rx.changed() => {
                if changed.is_err() || *close_rx.borrow() {
                    break;
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCmd::Text(text)) => {
                        let words = text.split_whitespace().count().max(1);
                        let chunk = vec![0u8; words * options.bytes_per_word];
                        if event_tx.send(TtsEvent::Audio(chunk)).await.is_err() {
                            break;
                        }
                    }
                    Some(SessionCmd::Flush(ack)) => {
                        let _ = ack.send(());
                    }
                    None => break,
                }
            }
        }
    }

    tokio::time::sleep(options.close_delay).await;
    state_tx.send_replace(TtsSessionState::Closed);
    // event_tx drops here, ending the consumer's pump
}

#[async_trait]
impl TextToSpeech for SilenceTts {
    async fn open_session(
        &self,
        _config: &TtsSessionConfig,
    ) -> CoreResult<(Arc<dyn TtsSession>, mpsc::Receiver<TtsEvent>)> {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(TtsSessionState::Connecting);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (close_tx, close_rx) = watch::channel(false);

        tokio::spawn(silence_engine(
            self.options.clone(),
            event_tx,
            state_tx,
            cmd_rx,
            close_rx,
        ));

        let session = Arc::new(SilenceSession {
            cmd_tx,
            close_tx,
            state_rx,
        });
        Ok((session, event_rx))
    }

    fn provider_name(&self) -> &str {
        "silence"
    }
}

// =============================================================================
// Scripted chat backends
// =============================================================================

/// Streams pre-scripted replies, one per `generate_stream` call, word by
/// word with an optional inter-chunk delay. An exhausted script yields
/// empty streams; a scripted `Err` yields one stream error.
pub struct CannedChat {
    replies: Mutex<VecDeque<Result<String, String>>>,
    chunk_delay: Duration,
}

impl CannedChat {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            chunk_delay: Duration::ZERO,
        }
    }

    /// Full control over per-call outcomes, including failures.
    pub fn scripted(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

fn stream_words(text: String, delay: Duration) -> ChatStream {
    Box::pin(async_stream::stream! {
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let last = words.len().saturating_sub(1);
        for (i, word) in words.into_iter().enumerate() {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let delta = if i == 0 { word } else { format!(" {word}") };
            yield Ok(StreamChunk {
                delta,
                finish: (i == last).then_some(FinishReason::Stop),
            });
        }
    })
}

impl ChatCompletion for CannedChat {
    fn generate_stream(&self, _request: GenerateRequest) -> ChatStream {
        let reply = self.replies.lock().pop_front();
        match reply {
            None => stream_words(String::new(), Duration::ZERO),
            Some(Ok(text)) => stream_words(text, self.chunk_delay),
            Some(Err(message)) => Box::pin(async_stream::stream! {
                yield Err(CoreError::Chat(message));
            }),
        }
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

/// Echoes the user's utterance, for running the server without an LLM key.
pub struct EchoChat {
    chunk_delay: Duration,
}

impl EchoChat {
    pub fn new() -> Self {
        Self {
            chunk_delay: Duration::from_millis(30),
        }
    }
}

impl Default for EchoChat {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatCompletion for EchoChat {
    fn generate_stream(&self, request: GenerateRequest) -> ChatStream {
        let utterance = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        stream_words(format!("You said: {utterance}"), self.chunk_delay)
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

// =============================================================================
// STT stand-ins
// =============================================================================

struct ChannelSttSession {
    events: mpsc::Sender<SttEvent>,
}

#[async_trait]
impl SttSession for ChannelSttSession {
    async fn send_audio(&self, _pcm: Vec<u8>) -> CoreResult<()> {
        Ok(())
    }

    async fn close(&self) {
        let _ = self.events.send(SttEvent::Closed).await;
    }
}

/// Accepts audio and never produces a transcript. Development fallback when
/// no STT vendor is configured.
pub struct NullSpeechToText;

#[async_trait]
impl SpeechToText for NullSpeechToText {
    async fn open_session(
        &self,
        _config: &SttSessionConfig,
    ) -> CoreResult<(Arc<dyn SttSession>, mpsc::Receiver<SttEvent>)> {
        tracing::warn!("No STT vendor configured; audio will not be transcribed");
        let (tx, rx) = mpsc::channel(64);
        Ok((Arc::new(ChannelSttSession { events: tx }), rx))
    }

    fn provider_name(&self) -> &str {
        "null"
    }
}

/// Test STT whose sessions expose an injector for transcript events.
#[derive(Default)]
pub struct ChannelSpeechToText {
    injectors: Mutex<Vec<mpsc::Sender<SttEvent>>>,
}

impl ChannelSpeechToText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injector for the most recently opened session.
    pub fn injector(&self) -> Option<mpsc::Sender<SttEvent>> {
        self.injectors.lock().last().cloned()
    }
}

#[async_trait]
impl SpeechToText for ChannelSpeechToText {
    async fn open_session(
        &self,
        _config: &SttSessionConfig,
    ) -> CoreResult<(Arc<dyn SttSession>, mpsc::Receiver<SttEvent>)> {
        let (tx, rx) = mpsc::channel(64);
        self.injectors.lock().push(tx.clone());
        Ok((Arc::new(ChannelSttSession { events: tx }), rx))
    }

    fn provider_name(&self) -> &str {
        "channel"
    }
}
