//! End-to-end pipeline tests
//!
//! Drives a full session orchestrator with scripted chat replies and the
//! silence TTS engine, asserting the conversation-level guarantees:
//! FIFO processing, backpressure signaling, barge-in semantics, bounded
//! teardown waits, and single-TTS-handle exclusivity.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use voicebridge_core::{
    ChatCompletion, Outbound, Result as CoreResult, ServerEvent, SpeechToText, TextToSpeech,
    TranscriptEvent, TtsEvent, TtsSession, TtsSessionConfig, TtsSessionState,
};
use voicebridge_pipeline::adapters::{
    CannedChat, ChannelSpeechToText, SilenceTts, SilenceTtsOptions,
};
use voicebridge_pipeline::{SessionOrchestrator, SessionPipelineConfig};

struct Harness {
    orchestrator: Arc<SessionOrchestrator>,
    outbound_rx: mpsc::Receiver<Outbound>,
    shutdown_tx: watch::Sender<bool>,
}

impl Harness {
    fn new(chat: Arc<dyn ChatCompletion>, tts: Arc<dyn TextToSpeech>) -> Self {
        Self::with_config(chat, tts, SessionPipelineConfig::default())
    }

    fn with_config(
        chat: Arc<dyn ChatCompletion>,
        tts: Arc<dyn TextToSpeech>,
        config: SessionPipelineConfig,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        let orchestrator = Arc::new(SessionOrchestrator::new(
            "test-session",
            chat,
            tts,
            Default::default(),
            config,
            outbound_tx,
        ));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            orchestrator,
            outbound_rx,
            shutdown_tx,
        }
    }

    fn start(&self) {
        let orchestrator = self.orchestrator.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move { orchestrator.run(shutdown_rx).await });
    }

    async fn say(&self, text: &str) {
        self.orchestrator
            .ingest_transcript(TranscriptEvent::final_(text))
            .await;
    }

    /// Next JSON event, skipping binary audio frames.
    async fn next_event(&mut self) -> ServerEvent {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(10), self.outbound_rx.recv())
                .await
                .expect("timed out waiting for an event")
                .expect("outbound channel closed");
            match frame {
                Outbound::Event(event) => return event,
                Outbound::Audio(_) => continue,
            }
        }
    }

    /// Collect events until `ai_done` has been seen `count` times. Returns
    /// the full event log and the chunk text per completed response.
    async fn collect_responses(&mut self, count: usize) -> (Vec<ServerEvent>, Vec<String>) {
        let mut events = Vec::new();
        let mut segments = Vec::new();
        let mut current = String::new();
        while segments.len() < count {
            let event = self.next_event().await;
            match &event {
                ServerEvent::AiChunk { text } => current.push_str(text),
                ServerEvent::AiDone => {
                    segments.push(std::mem::take(&mut current));
                }
                _ => {}
            }
            events.push(event);
        }
        (events, segments)
    }
}

fn count_busy(events: &[ServerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ServerEvent::Busy { .. }))
        .count()
}

fn count_errors(events: &[ServerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ServerEvent::Error { .. }))
        .count()
}

#[tokio::test]
async fn test_transcripts_processed_in_fifo_order() {
    let chat = Arc::new(CannedChat::new(["alpha one", "beta two", "gamma three"]));
    let mut harness = Harness::new(chat, Arc::new(SilenceTts::default()));
    harness.start();

    harness.say("first question").await;
    harness.say("second question").await;
    harness.say("third question").await;

    let (_, segments) = harness.collect_responses(3).await;
    assert_eq!(segments, vec!["alpha one", "beta two", "gamma three"]);
}

#[tokio::test]
async fn test_overflow_rejects_sixth_transcript_then_drains_five() {
    let chat = Arc::new(CannedChat::new(["r1", "r2", "r3", "r4", "r5"]));
    let mut harness = Harness::new(chat, Arc::new(SilenceTts::default()));
    // Processing not started yet: the queue fills up.

    for i in 1..=6 {
        harness.say(&format!("utterance {i}")).await;
    }

    // Six transcript echoes, load notices at depths 4 and 5, one rejection.
    let mut transcripts = 0;
    let mut load_depths = Vec::new();
    let mut busy = 0;
    for _ in 0..9 {
        match harness.next_event().await {
            ServerEvent::Transcript { is_final: true, .. } => transcripts += 1,
            ServerEvent::ProcessingLoad { queue_size } => load_depths.push(queue_size),
            ServerEvent::Busy { .. } => busy += 1,
            other => panic!("unexpected event: {:?}", other),
        }
    }
    assert_eq!(transcripts, 6);
    assert_eq!(load_depths, vec![4, 5]);
    assert_eq!(busy, 1);
    assert_eq!(harness.orchestrator.queue_depth(), 5);

    harness.start();
    let (events, segments) = harness.collect_responses(5).await;
    assert_eq!(segments, vec!["r1", "r2", "r3", "r4", "r5"]);
    assert_eq!(count_busy(&events), 0);
}

#[tokio::test]
async fn test_interrupt_abandons_response_but_preserves_queue() {
    let chat = Arc::new(
        CannedChat::new([
            "this is a deliberately long reply with enough words to interrupt cleanly",
            "We accept returns within thirty days",
        ])
        .with_chunk_delay(Duration::from_millis(50)),
    );
    let mut harness = Harness::new(chat, Arc::new(SilenceTts::default()));
    harness.start();

    harness.say("hi").await;

    // Wait until the first reply is streaming.
    loop {
        if matches!(harness.next_event().await, ServerEvent::AiChunk { .. }) {
            break;
        }
    }

    harness.orchestrator.interrupt().await;
    // New speech lands while the interrupted response tears down.
    harness.say("what's your return policy").await;

    let (events, segments) = harness.collect_responses(1).await;

    // Interrupt was acknowledged, and the only completed response is the
    // second one: no ai_done was ever emitted for the interrupted reply.
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::InterruptAck { .. })));
    assert_eq!(segments.len(), 1);
    assert!(segments[0].ends_with("We accept returns within thirty days"));
    assert!(!segments[0].contains("deliberately long reply"));
    assert_eq!(count_errors(&events), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_tts_close_skips_one_utterance_then_recovers() {
    let chat = Arc::new(
        CannedChat::scripted(vec![
            Ok("a long reply that will be interrupted midway through".to_string()),
            Ok("recovered fine".to_string()),
        ])
        .with_chunk_delay(Duration::from_millis(100)),
    );
    // Teardown takes 3 s; the close-wait bound is 1 s.
    let tts = Arc::new(SilenceTts::new(SilenceTtsOptions {
        close_delay: Duration::from_secs(3),
        ..Default::default()
    }));
    let mut harness = Harness::new(chat, tts);
    harness.start();

    harness.say("one").await;
    loop {
        if matches!(harness.next_event().await, ServerEvent::AiChunk { .. }) {
            break;
        }
    }
    harness.orchestrator.interrupt().await;
    harness.say("two").await;
    harness.say("three").await;

    // "two" is skipped with an error after the bounded close-wait expires;
    // "three" is still processed.
    let (events, segments) = harness.collect_responses(1).await;
    assert_eq!(count_errors(&events), 1);
    assert_eq!(segments.len(), 1);
    // A chunk of the abandoned reply may still be in flight, so only the
    // tail is exact.
    assert!(segments[0].ends_with("recovered fine"));
    assert!(!segments[0].contains("interrupted midway"));
}

#[tokio::test]
async fn test_empty_reply_is_silently_skipped() {
    let chat = Arc::new(CannedChat::scripted(vec![
        Ok(String::new()),
        Ok("still alive".to_string()),
    ]));
    let mut harness = Harness::new(chat, Arc::new(SilenceTts::default()));
    harness.start();

    harness.say("anybody home").await;
    harness.say("hello").await;

    let (events, segments) = harness.collect_responses(1).await;
    assert_eq!(segments, vec!["still alive"]);
    assert_eq!(count_errors(&events), 0);
}

#[tokio::test]
async fn test_chat_failure_is_scoped_to_one_utterance() {
    let chat = Arc::new(CannedChat::scripted(vec![
        Err("upstream unavailable".to_string()),
        Ok("back to normal".to_string()),
    ]));
    let mut harness = Harness::new(chat, Arc::new(SilenceTts::default()));
    harness.start();

    harness.say("first").await;
    harness.say("second").await;

    let (events, segments) = harness.collect_responses(1).await;
    assert_eq!(count_errors(&events), 1);
    assert_eq!(segments, vec!["back to normal"]);
}

// =============================================================================
// Single-handle invariant
// =============================================================================

/// Wraps the silence engine and records a violation if a new session is
/// opened while any earlier session has not yet reported `Closed`.
struct ExclusiveTts {
    inner: SilenceTts,
    states: parking_lot::Mutex<Vec<tokio::sync::watch::Receiver<TtsSessionState>>>,
    violations: Arc<AtomicUsize>,
}

impl ExclusiveTts {
    fn new() -> Self {
        Self {
            inner: SilenceTts::default(),
            states: parking_lot::Mutex::new(Vec::new()),
            violations: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl TextToSpeech for ExclusiveTts {
    async fn open_session(
        &self,
        config: &TtsSessionConfig,
    ) -> CoreResult<(Arc<dyn TtsSession>, mpsc::Receiver<TtsEvent>)> {
        let (session, events) = self.inner.open_session(config).await?;

        let mut states = self.states.lock();
        if states
            .iter()
            .any(|rx| *rx.borrow() != TtsSessionState::Closed)
        {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        states.push(session.state());

        Ok((session, events))
    }

    fn provider_name(&self) -> &str {
        "exclusive"
    }
}

#[tokio::test]
async fn test_at_most_one_tts_session_open() {
    let tts = Arc::new(ExclusiveTts::new());
    let violations = tts.violations.clone();
    let chat = Arc::new(
        CannedChat::new(["reply one", "reply two", "reply three is a bit longer"])
            .with_chunk_delay(Duration::from_millis(10)),
    );
    let mut harness = Harness::new(chat, tts);
    harness.start();

    harness.say("a").await;
    harness.say("b").await;

    // Interrupt mid-way through one response to exercise the teardown path.
    loop {
        if matches!(harness.next_event().await, ServerEvent::AiChunk { .. }) {
            break;
        }
    }
    harness.orchestrator.interrupt().await;
    harness.say("c").await;

    let _ = harness.collect_responses(2).await;
    assert_eq!(violations.load(Ordering::SeqCst), 0);
}

// =============================================================================
// STT event plumbing
// =============================================================================

#[tokio::test]
async fn test_interim_transcripts_are_forwarded_but_never_queued() {
    let chat = Arc::new(CannedChat::new(Vec::<String>::new()));
    let mut harness = Harness::new(chat, Arc::new(SilenceTts::default()));

    harness
        .orchestrator
        .ingest_transcript(TranscriptEvent::interim("what ti"))
        .await;
    harness
        .orchestrator
        .ingest_transcript(TranscriptEvent::interim("what time is"))
        .await;

    for _ in 0..2 {
        match harness.next_event().await {
            ServerEvent::Transcript { is_final, .. } => assert!(!is_final),
            other => panic!("unexpected event: {:?}", other),
        }
    }
    assert_eq!(harness.orchestrator.queue_depth(), 0);
}

#[tokio::test]
async fn test_channel_stt_injects_events() {
    let stt = ChannelSpeechToText::new();
    let (_session, mut events) = stt.open_session(&Default::default()).await.unwrap();
    let injector = stt.injector().unwrap();

    injector
        .send(voicebridge_core::SttEvent::Transcript(
            TranscriptEvent::final_("hello"),
        ))
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        voicebridge_core::SttEvent::Transcript(t) => {
            assert!(t.is_final);
            assert_eq!(t.text, "hello");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}
