//! Session orchestrator
//!
//! Owns one conversation pipeline per client connection: the transcript
//! queue, the interrupt controller, the TTS handle slot, and the response
//! coordinator. The server crate feeds it STT events and client commands;
//! it emits [`Outbound`] frames for the transport pump.
//!
//! Queue draining is strictly serialized: one utterance, one chat call, one
//! TTS session at a time, in arrival order.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use voicebridge_core::{
    ChatCompletion, ConversationContext, Outbound, ServerEvent, TextToSpeech, TranscriptEntry,
    TranscriptEvent, TtsSessionConfig,
};

use crate::coordinator::{CoordinatorConfig, ResponseCoordinator};
use crate::interrupt::InterruptController;
use crate::queue::{EnqueueOutcome, TranscriptQueue};
use crate::tts_slot::TtsHandleSlot;

/// Pipeline configuration for one session.
#[derive(Debug, Clone)]
pub struct SessionPipelineConfig {
    pub queue_capacity: usize,
    pub tts_open_wait: std::time::Duration,
    pub tts_close_wait: std::time::Duration,
    pub tts_close_grace: std::time::Duration,
    pub tts_session: TtsSessionConfig,
    pub chat_temperature: f32,
    pub chat_max_tokens: u32,
}

impl Default for SessionPipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 5,
            tts_open_wait: std::time::Duration::from_secs(5),
            tts_close_wait: std::time::Duration::from_secs(1),
            tts_close_grace: std::time::Duration::from_millis(200),
            tts_session: TtsSessionConfig::default(),
            chat_temperature: 0.7,
            chat_max_tokens: 256,
        }
    }
}

impl SessionPipelineConfig {
    /// Build from platform settings plus the session's TTS configuration.
    pub fn from_settings(
        orchestrator: &voicebridge_config::OrchestratorConfig,
        chat: &voicebridge_config::ChatDefaults,
        tts_session: TtsSessionConfig,
    ) -> Self {
        Self {
            queue_capacity: orchestrator.queue_capacity,
            tts_open_wait: orchestrator.tts_open_wait(),
            tts_close_wait: orchestrator.tts_close_wait(),
            tts_close_grace: orchestrator.tts_close_grace(),
            tts_session,
            chat_temperature: chat.temperature,
            chat_max_tokens: chat.max_tokens,
        }
    }
}

/// Per-session conversation engine.
pub struct SessionOrchestrator {
    session_id: String,
    context: ConversationContext,
    queue: Arc<TranscriptQueue>,
    controller: Arc<InterruptController>,
    slot: TtsHandleSlot,
    coordinator: ResponseCoordinator,
    outbound: mpsc::Sender<Outbound>,
}

impl SessionOrchestrator {
    pub fn new(
        session_id: impl Into<String>,
        chat: Arc<dyn ChatCompletion>,
        tts: Arc<dyn TextToSpeech>,
        context: ConversationContext,
        config: SessionPipelineConfig,
        outbound: mpsc::Sender<Outbound>,
    ) -> Self {
        let queue = Arc::new(TranscriptQueue::new(config.queue_capacity));
        let controller = Arc::new(InterruptController::new(config.tts_close_wait));
        let slot = TtsHandleSlot::new();
        let coordinator = ResponseCoordinator::new(
            chat,
            tts,
            outbound.clone(),
            slot.clone(),
            controller.clone(),
            CoordinatorConfig {
                tts_open_wait: config.tts_open_wait,
                tts_close_grace: config.tts_close_grace,
                tts_session: config.tts_session,
                chat_temperature: config.chat_temperature,
                chat_max_tokens: config.chat_max_tokens,
            },
        );

        Self {
            session_id: session_id.into(),
            context,
            queue,
            controller,
            slot,
            coordinator,
            outbound,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Handle one STT event.
    ///
    /// Every event is forwarded to the client for display. Only non-empty
    /// final transcripts enter the queue; a full queue drops the entry and
    /// tells the client it is busy.
    pub async fn ingest_transcript(&self, event: TranscriptEvent) {
        let _ = self
            .outbound
            .send(
                ServerEvent::Transcript {
                    text: event.text.clone(),
                    is_final: event.is_final,
                }
                .into(),
            )
            .await;

        if !event.is_final || event.text.trim().is_empty() {
            return;
        }

        match self.queue.enqueue(TranscriptEntry::from(event)) {
            EnqueueOutcome::Rejected => {
                tracing::warn!(
                    session_id = %self.session_id,
                    "Transcript queue full, dropping utterance"
                );
                let _ = self
                    .outbound
                    .send(
                        ServerEvent::Busy {
                            message: "Assistant is busy, please repeat that in a moment"
                                .to_string(),
                        }
                        .into(),
                    )
                    .await;
            }
            EnqueueOutcome::Accepted {
                depth,
                nearing_capacity,
            } => {
                tracing::debug!(
                    session_id = %self.session_id,
                    depth,
                    "Queued final transcript"
                );
                if nearing_capacity {
                    let _ = self
                        .outbound
                        .send(ServerEvent::ProcessingLoad { queue_size: depth }.into())
                        .await;
                }
            }
        }
    }

    /// Handle a client interrupt command.
    ///
    /// Acknowledged immediately; the queue is never cleared, so speech that
    /// arrived during the interruption is still processed.
    pub async fn interrupt(&self) {
        let in_flight = self.controller.request_interrupt(&self.slot);
        tracing::info!(
            session_id = %self.session_id,
            in_flight,
            "Interrupt received"
        );
        let _ = self
            .outbound
            .send(
                ServerEvent::InterruptAck {
                    message: "Response interrupted".to_string(),
                }
                .into(),
            )
            .await;
    }

    /// Request close of the active TTS handle, if any. Used at teardown.
    pub fn abort_active_response(&self) {
        self.slot.request_close();
    }

    /// Serialized processing loop. Runs until `shutdown` flips to true or
    /// its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let entry = tokio::select! {
                changed = shutdown.changed() => {
                    match changed {
                        Ok(()) if !*shutdown.borrow() => continue,
                        _ => break,
                    }
                }
                entry = self.queue.dequeue() => entry,
            };

            // Teardown of the previous response must be confirmed before
            // this utterance may open its own TTS session.
            if let Err(e) = self.controller.settle_before_next(&self.slot).await {
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %e,
                    skipped = %entry.text,
                    "Skipping utterance after stuck speech teardown"
                );
                let _ = self
                    .outbound
                    .send(ServerEvent::Error { message: e.to_string() }.into())
                    .await;
                self.controller.recover();
                continue;
            }

            self.controller.begin_processing();
            match self.coordinator.run(&entry, &self.context).await {
                Ok(outcome) => {
                    tracing::debug!(
                        session_id = %self.session_id,
                        interrupted = outcome.interrupted,
                        produced = outcome.produced_output,
                        "Utterance complete"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        error = %e,
                        "Utterance failed, continuing with next"
                    );
                    let _ = self
                        .outbound
                        .send(ServerEvent::Error { message: e.to_string() }.into())
                        .await;
                    self.slot.request_close();
                }
            }
            self.controller.utterance_complete();
        }

        self.slot.request_close();
        tracing::debug!(session_id = %self.session_id, "Processing loop stopped");
    }
}
