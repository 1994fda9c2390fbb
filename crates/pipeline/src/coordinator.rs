//! Response streaming coordinator
//!
//! Runs one dequeued utterance end to end: opens a TTS session, drains the
//! chat-completion stream, and fans every chunk out to the client text
//! channel and the TTS engine in the same step. Interruption is observed
//! cooperatively at chunk boundaries.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use voicebridge_core::{
    ChatCompletion, ConversationContext, GenerateRequest, Outbound, ServerEvent, TextToSpeech,
    TranscriptEntry, TtsEvent, TtsSession, TtsSessionConfig, TtsSessionState,
};

use crate::interrupt::InterruptController;
use crate::tts_slot::TtsHandleSlot;
use crate::PipelineError;

/// How one utterance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtteranceOutcome {
    /// The response was abandoned mid-stream by a client interrupt
    pub interrupted: bool,
    /// At least one non-empty chunk was forwarded. False means the chat
    /// stream produced nothing: no audio, no `ai_done`, no error.
    pub produced_output: bool,
}

/// Coordinator wait budgets and chat sampling parameters.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Bound on waiting for the TTS session to open (≈ 5 s)
    pub tts_open_wait: Duration,
    /// Grace delay before the end-of-utterance close request, so trailing
    /// audio can flush
    pub tts_close_grace: Duration,
    /// Per-session TTS configuration
    pub tts_session: TtsSessionConfig,
    pub chat_temperature: f32,
    pub chat_max_tokens: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tts_open_wait: Duration::from_secs(5),
            tts_close_grace: Duration::from_millis(200),
            tts_session: TtsSessionConfig::default(),
            chat_temperature: 0.7,
            chat_max_tokens: 256,
        }
    }
}

/// Drives one assistant response per call to [`ResponseCoordinator::run`].
pub struct ResponseCoordinator {
    chat: Arc<dyn ChatCompletion>,
    tts: Arc<dyn TextToSpeech>,
    outbound: mpsc::Sender<Outbound>,
    slot: TtsHandleSlot,
    controller: Arc<InterruptController>,
    config: CoordinatorConfig,
}

impl ResponseCoordinator {
    pub fn new(
        chat: Arc<dyn ChatCompletion>,
        tts: Arc<dyn TextToSpeech>,
        outbound: mpsc::Sender<Outbound>,
        slot: TtsHandleSlot,
        controller: Arc<InterruptController>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            chat,
            tts,
            outbound,
            slot,
            controller,
            config,
        }
    }

    /// Process one utterance. Errors are utterance-scoped; the caller
    /// reports them and moves on to the next queue entry.
    pub async fn run(
        &self,
        entry: &TranscriptEntry,
        context: &ConversationContext,
    ) -> Result<UtteranceOutcome, PipelineError> {
        let (session, events) = self
            .tts
            .open_session(&self.config.tts_session)
            .await
            .map_err(|e| PipelineError::Tts(e.to_string()))?;
        self.slot.install(session.clone());

        if let Err(e) = self.await_open(&session).await {
            // No handle may leak: close even though open never completed.
            session.request_close();
            self.slot.clear_if(&session);
            return Err(e);
        }

        // Synthesized audio flows to the client for the whole response; the
        // pump ends when the engine drops the event channel at close, and
        // clears the slot at that point.
        let pump = tokio::spawn(Self::pump_audio(
            events,
            session.clone(),
            self.slot.clone(),
            self.outbound.clone(),
        ));

        let result = self.stream_reply(entry, context, &session).await;

        // Always attempt the close, interrupted or not.
        tokio::time::sleep(self.config.tts_close_grace).await;
        session.request_close();
        drop(pump);

        result
    }

    /// Wait (bounded) for the session to leave `Connecting`.
    async fn await_open(&self, session: &Arc<dyn TtsSession>) -> Result<(), PipelineError> {
        let mut state = session.state();
        let ready = tokio::time::timeout(
            self.config.tts_open_wait,
            state.wait_for(|s| *s != TtsSessionState::Connecting),
        )
        .await;

        match ready {
            Ok(Ok(observed)) if *observed == TtsSessionState::Open => Ok(()),
            Ok(_) => Err(PipelineError::Tts(
                "Speech output closed before becoming ready".to_string(),
            )),
            Err(_) => Err(PipelineError::TtsOpenTimeout(self.config.tts_open_wait)),
        }
    }

    /// Drain the chat stream, fanning each chunk out to the client and the
    /// TTS session in that order, then checking the interrupted flag.
    async fn stream_reply(
        &self,
        entry: &TranscriptEntry,
        context: &ConversationContext,
        session: &Arc<dyn TtsSession>,
    ) -> Result<UtteranceOutcome, PipelineError> {
        let request = GenerateRequest::new(context.system_prompt())
            .with_user_message(&entry.text)
            .with_temperature(self.config.chat_temperature)
            .with_max_tokens(self.config.chat_max_tokens);

        let mut stream = self.chat.generate_stream(request);
        let mut produced = false;
        let mut interrupted = false;

        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| PipelineError::Chat(e.to_string()))?;

            if !chunk.delta.is_empty() {
                produced = true;
                self.send_event(ServerEvent::AiChunk {
                    text: chunk.delta.clone(),
                })
                .await?;
                if let Err(e) = session.send_text(&chunk.delta).await {
                    // An interrupt may have closed the session under us;
                    // that is the interrupt path, not a failure.
                    if self.controller.is_interrupted() {
                        interrupted = true;
                        break;
                    }
                    return Err(PipelineError::Tts(e.to_string()));
                }
            }

            if self.controller.is_interrupted() {
                interrupted = true;
                break;
            }
        }

        if interrupted {
            tracing::debug!(utterance = %entry.text, "Response abandoned mid-stream");
        } else if produced {
            session
                .flush()
                .await
                .map_err(|e| PipelineError::Tts(e.to_string()))?;
            self.send_event(ServerEvent::AiDone).await?;
        } else {
            tracing::debug!(utterance = %entry.text, "Empty reply, nothing to speak");
        }

        Ok(UtteranceOutcome {
            interrupted,
            produced_output: produced,
        })
    }

    async fn send_event(&self, event: ServerEvent) -> Result<(), PipelineError> {
        self.outbound
            .send(event.into())
            .await
            .map_err(|_| PipelineError::OutboundClosed)
    }

    async fn pump_audio(
        mut events: mpsc::Receiver<TtsEvent>,
        session: Arc<dyn TtsSession>,
        slot: TtsHandleSlot,
        outbound: mpsc::Sender<Outbound>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                TtsEvent::Audio(bytes) => {
                    if outbound.send(Outbound::Audio(bytes)).await.is_err() {
                        break;
                    }
                }
                TtsEvent::Error(message) => {
                    tracing::warn!(error = %message, "TTS engine reported an error");
                }
            }
        }
        // Event channel dropped: the engine closed the session.
        slot.clear_if(&session);
    }
}
