//! WebSocket handler
//!
//! One session per connection. Setup resolves the tenant profile and
//! verifies credentials before anything else runs; failures there are fatal
//! and close the connection. After `ready`, binary frames feed the STT
//! session, JSON commands drive the orchestrator, and the outbound pump
//! forwards orchestrator frames to the client.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use voicebridge_core::{
    ClientCommand, Outbound, ServerEvent, SttEvent, SttSession, SttSessionConfig, TtsSessionConfig,
};
use voicebridge_llm::ChatFactory;
use voicebridge_pipeline::{SessionOrchestrator, SessionPipelineConfig};

use crate::metrics::{record_outbound_event, record_session_closed, record_session_opened};
use crate::rate_limit::RateLimiter;
use crate::session::Session;
use crate::state::AppState;

/// Connection identification, supplied by the (external) auth layer.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub business_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Everything a live session needs, produced by the fatal-or-ready setup.
struct SessionSetup {
    session: Arc<Session>,
    stt_session: Arc<dyn SttSession>,
    stt_events: mpsc::Receiver<SttEvent>,
    orchestrator: Arc<SessionOrchestrator>,
    outbound_tx: mpsc::Sender<Outbound>,
    outbound_rx: mpsc::Receiver<Outbound>,
}

/// WebSocket handler
pub struct WebSocketHandler;

impl WebSocketHandler {
    /// Handle WebSocket upgrade
    pub async fn handle(
        ws: WebSocketUpgrade,
        State(state): State<AppState>,
        Query(params): Query<ConnectParams>,
    ) -> Response {
        ws.on_upgrade(move |socket| Self::handle_socket(socket, state, params))
    }

    /// Handle one WebSocket connection for its whole lifetime.
    async fn handle_socket(socket: WebSocket, state: AppState, params: ConnectParams) {
        let (mut sender, mut receiver) = socket.split();

        // Session setup: tenant resolution and credential verification are
        // fatal on failure - structured error, then close, no retry.
        let setup = match Self::setup(&state, &params).await {
            Ok(setup) => setup,
            Err(message) => {
                tracing::warn!(
                    business_id = %params.business_id,
                    error = %message,
                    "Session setup failed"
                );
                let _ = sender
                    .send(Message::Text(encode(&ServerEvent::Error { message })))
                    .await;
                let _ = sender.close().await;
                return;
            }
        };

        let SessionSetup {
            session,
            stt_session,
            stt_events,
            orchestrator,
            outbound_tx,
            outbound_rx,
        } = setup;

        record_session_opened();

        // Nothing is processed before `ready` reaches the pump queue first.
        let _ = outbound_tx.send(ServerEvent::Ready.into()).await;

        let pump_task = tokio::spawn(Self::pump_outbound(outbound_rx, sender));

        // STT events are consumed in their own task, preserving engine order.
        let stt_task = {
            let orchestrator = orchestrator.clone();
            let outbound_tx = outbound_tx.clone();
            let mut events = stt_events;
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    match event {
                        SttEvent::Transcript(transcript) => {
                            orchestrator.ingest_transcript(transcript).await;
                        }
                        SttEvent::Error(message) => {
                            let _ = outbound_tx
                                .send(
                                    ServerEvent::Error {
                                        message: format!("Speech recognition error: {message}"),
                                    }
                                    .into(),
                                )
                                .await;
                        }
                        SttEvent::Closed => break,
                    }
                }
            })
        };

        // Serialized queue drain for this session.
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run_task = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run(shutdown_rx).await })
        };

        let mut rate_limiter = RateLimiter::new(state.get_config().server.rate_limit.clone());

        // Main inbound loop.
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Binary(audio)) => {
                    if rate_limiter.check_audio(audio.len()).is_err() {
                        tracing::warn!(
                            session_id = %session.id,
                            bytes = audio.len(),
                            "Audio rate limit exceeded"
                        );
                        let _ = outbound_tx
                            .send(
                                ServerEvent::Error {
                                    message: "Rate limit exceeded".to_string(),
                                }
                                .into(),
                            )
                            .await;
                        continue;
                    }
                    session.touch();
                    if let Err(e) = stt_session.send_audio(audio).await {
                        tracing::warn!(session_id = %session.id, error = %e, "Audio forward failed");
                    }
                }
                Ok(Message::Text(text)) => {
                    if rate_limiter.check_message().is_err() {
                        let _ = outbound_tx
                            .send(
                                ServerEvent::Error {
                                    message: "Rate limit exceeded".to_string(),
                                }
                                .into(),
                            )
                            .await;
                        continue;
                    }
                    session.touch();

                    match serde_json::from_str::<ClientCommand>(&text) {
                        Ok(ClientCommand::Interrupt) => {
                            orchestrator.interrupt().await;
                        }
                        Ok(ClientCommand::StopConversation) => {
                            tracing::info!(session_id = %session.id, "Client stopped conversation");
                            break;
                        }
                        Ok(ClientCommand::Ping) => {
                            let _ = outbound_tx.send(ServerEvent::Pong.into()).await;
                        }
                        Ok(ClientCommand::Audio { data }) => match BASE64.decode(&data) {
                            Ok(audio) => {
                                if rate_limiter.check_audio(audio.len()).is_ok() {
                                    if let Err(e) = stt_session.send_audio(audio).await {
                                        tracing::warn!(
                                            session_id = %session.id,
                                            error = %e,
                                            "Audio forward failed"
                                        );
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!(session_id = %session.id, error = %e, "Bad audio payload");
                            }
                        },
                        Err(_) => {
                            tracing::debug!(session_id = %session.id, "Ignoring unknown message");
                        }
                    }
                }
                // Protocol-level pings are answered by the transport.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::warn!(session_id = %session.id, error = %e, "WebSocket error");
                    break;
                }
            }
        }

        // Teardown: stop the drain loop, release the STT session, close any
        // open TTS handle, deregister.
        let _ = shutdown_tx.send(true);
        stt_session.close().await;
        orchestrator.abort_active_response();

        stt_task.abort();
        run_task.abort();
        pump_task.abort();

        state.sessions.remove(&session.id);
        record_session_closed();
        tracing::info!(session_id = %session.id, "WebSocket closed");
    }

    /// Resolve tenant configuration, verify credentials, open the STT
    /// session, and build the orchestrator. Any error here is fatal.
    async fn setup(state: &AppState, params: &ConnectParams) -> Result<SessionSetup, String> {
        if params.business_id.trim().is_empty() {
            return Err("business_id query parameter is required".to_string());
        }

        let profile = state
            .tenants
            .resolve(&params.business_id)
            .map_err(|e| e.to_string())?;
        profile.verify_credentials().map_err(|e| e.to_string())?;

        // Snapshot everything needed from config before the first await.
        let (chat, stt_config, pipeline_config) = {
            let config = state.get_config();

            let chat = ChatFactory::create(&config.providers.chat, &profile.credentials)
                .map_err(|e| e.to_string())?;

            let stt_config = SttSessionConfig {
                api_key: profile.credentials.stt_api_key.clone(),
                language: config.providers.stt.language.clone(),
                sample_rate: config.providers.stt.sample_rate,
                endpoint: config.providers.stt.endpoint.clone(),
            };

            let tts_config = TtsSessionConfig {
                api_key: profile.credentials.tts_api_key.clone(),
                voice_id: profile.credentials.tts_voice.clone(),
                sample_rate: config.providers.tts.sample_rate,
                endpoint: config.providers.tts.endpoint.clone(),
            };

            let pipeline_config = SessionPipelineConfig::from_settings(
                &config.orchestrator,
                &config.providers.chat,
                tts_config,
            );

            (chat, stt_config, pipeline_config)
        };

        let (stt_session, stt_events) = state
            .stt
            .open_session(&stt_config)
            .await
            .map_err(|e| format!("Failed to start speech recognition: {e}"))?;

        let session = match state
            .sessions
            .create(&params.business_id, params.user_id.clone())
        {
            Ok(session) => session,
            Err(e) => {
                // Release the STT stream opened above.
                stt_session.close().await;
                return Err(e.to_string());
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        let orchestrator = Arc::new(SessionOrchestrator::new(
            session.id.clone(),
            chat,
            state.tts.clone(),
            profile.context.clone(),
            pipeline_config,
            outbound_tx.clone(),
        ));

        tracing::info!(
            session_id = %session.id,
            business_id = %profile.business_id,
            tenant = %profile.display_name,
            "Session initialized"
        );

        Ok(SessionSetup {
            session,
            stt_session,
            stt_events,
            orchestrator,
            outbound_tx,
            outbound_rx,
        })
    }

    /// Forward orchestrator frames to the client: JSON for events, binary
    /// for synthesized audio. Also the single recording point for
    /// conversation metrics.
    async fn pump_outbound(
        mut outbound_rx: mpsc::Receiver<Outbound>,
        mut sender: SplitSink<WebSocket, Message>,
    ) {
        while let Some(frame) = outbound_rx.recv().await {
            let message = match frame {
                Outbound::Event(event) => {
                    record_outbound_event(&event);
                    Message::Text(encode(&event))
                }
                Outbound::Audio(bytes) => Message::Binary(bytes),
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    }
}

fn encode(event: &ServerEvent) -> String {
    serde_json::to_string(event).expect("server events always serialize")
}
