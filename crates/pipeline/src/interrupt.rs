//! Interrupt controller
//!
//! Tracks whether the in-flight response must be abandoned and coordinates
//! safe teardown of the active TTS session before the next utterance.
//!
//! A user who barges in must be able to speak again immediately: the
//! controller never lets teardown of the previous response block receipt of
//! new speech, but it does prevent two TTS sessions from emitting audio
//! into the same channel, hence the bounded close-wait before the next
//! dequeue is processed.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use voicebridge_core::TtsSessionState;

use crate::tts_slot::TtsHandleSlot;
use crate::PipelineError;

/// Controller phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptPhase {
    /// Nothing in flight
    Idle,
    /// A response is being generated and spoken
    Processing,
    /// Client interrupted the in-flight response
    InterruptRequested,
    /// Waiting (bounded) for the interrupted response's TTS close
    AwaitingTtsClose,
    /// Close-wait bound exceeded; one transcript is skipped
    Failed,
}

/// Per-session interrupt state machine.
pub struct InterruptController {
    phase: Mutex<InterruptPhase>,
    /// Checked cooperatively at chunk boundaries in the streaming loop.
    interrupted: AtomicBool,
    close_wait: Duration,
}

impl InterruptController {
    pub fn new(close_wait: Duration) -> Self {
        Self {
            phase: Mutex::new(InterruptPhase::Idle),
            interrupted: AtomicBool::new(false),
            close_wait,
        }
    }

    pub fn phase(&self) -> InterruptPhase {
        *self.phase.lock()
    }

    /// True once an interrupt has been requested for the current response.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// A transcript was dequeued and response generation begins.
    pub fn begin_processing(&self) {
        *self.phase.lock() = InterruptPhase::Processing;
    }

    /// Client interrupt while a response is in flight.
    ///
    /// Sets the interrupted flag and requests a non-blocking close of the
    /// active TTS handle. The transcript queue is NOT touched: speech that
    /// arrived during the interruption stays queued. Returns false when
    /// nothing was in flight.
    pub fn request_interrupt(&self, slot: &TtsHandleSlot) -> bool {
        {
            let mut phase = self.phase.lock();
            match *phase {
                InterruptPhase::Processing | InterruptPhase::InterruptRequested => {
                    self.interrupted.store(true, Ordering::SeqCst);
                    *phase = InterruptPhase::InterruptRequested;
                }
                _ => return false,
            }
        }
        slot.request_close();
        true
    }

    /// The coordinator finished (or abandoned) the current utterance.
    ///
    /// When interrupted, the phase stays at `InterruptRequested` so the
    /// close-wait discipline applies before the next dequeue.
    pub fn utterance_complete(&self) {
        if !self.is_interrupted() {
            *self.phase.lock() = InterruptPhase::Idle;
        }
    }

    /// Gate before processing the next queued transcript.
    ///
    /// If a TTS handle is still registered, wait for its close with the
    /// configured bound (a cancellable timeout over the handle's state
    /// watch). On expiry the handle gets a second, forced close request, is
    /// treated as closed, and `TtsCloseTimeout` is returned — the caller
    /// reports it, skips that one transcript, and the session continues.
    pub async fn settle_before_next(&self, slot: &TtsHandleSlot) -> Result<(), PipelineError> {
        let Some(handle) = slot.current() else {
            self.reset();
            return Ok(());
        };

        if self.is_interrupted() {
            *self.phase.lock() = InterruptPhase::AwaitingTtsClose;
        }

        let mut state = handle.state();
        let closed = tokio::time::timeout(
            self.close_wait,
            state.wait_for(|s| *s == TtsSessionState::Closed),
        )
        .await;

        match closed {
            // Close observed, or the session was dropped outright.
            Ok(_) => {
                slot.clear_if(&handle);
                self.reset();
                Ok(())
            }
            Err(_) => {
                tracing::warn!(
                    bound_ms = self.close_wait.as_millis() as u64,
                    "TTS close not observed within bound, forcing close"
                );
                handle.request_close();
                slot.clear();
                *self.phase.lock() = InterruptPhase::Failed;
                Err(PipelineError::TtsCloseTimeout(self.close_wait))
            }
        }
    }

    /// Return to `Idle` after the failed-teardown error has been reported.
    pub fn recover(&self) {
        self.reset();
    }

    fn reset(&self) {
        self.interrupted.store(false, Ordering::SeqCst);
        *self.phase.lock() = InterruptPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::watch;
    use voicebridge_core::{Result as CoreResult, TtsSession};

    /// Test handle whose close behavior is scripted by the test.
    struct FakeTts {
        state_tx: watch::Sender<TtsSessionState>,
        close_on_request: bool,
    }

    impl FakeTts {
        fn open(close_on_request: bool) -> Arc<Self> {
            let (state_tx, _) = watch::channel(TtsSessionState::Open);
            Arc::new(Self {
                state_tx,
                close_on_request,
            })
        }
    }

    #[async_trait]
    impl TtsSession for FakeTts {
        async fn send_text(&self, _text: &str) -> CoreResult<()> {
            Ok(())
        }

        async fn flush(&self) -> CoreResult<()> {
            Ok(())
        }

        fn request_close(&self) {
            if self.close_on_request {
                self.state_tx.send_replace(TtsSessionState::Closed);
            }
        }

        fn state(&self) -> watch::Receiver<TtsSessionState> {
            self.state_tx.subscribe()
        }
    }

    #[test]
    fn test_interrupt_only_acknowledged_while_processing() {
        let controller = InterruptController::new(Duration::from_secs(1));
        let slot = TtsHandleSlot::new();

        assert!(!controller.request_interrupt(&slot));
        assert!(!controller.is_interrupted());

        controller.begin_processing();
        assert!(controller.request_interrupt(&slot));
        assert!(controller.is_interrupted());
        assert_eq!(controller.phase(), InterruptPhase::InterruptRequested);
    }

    #[test]
    fn test_interrupt_requests_close_of_active_handle() {
        let controller = InterruptController::new(Duration::from_secs(1));
        let slot = TtsHandleSlot::new();
        let tts = FakeTts::open(true);
        slot.install(tts.clone());

        controller.begin_processing();
        controller.request_interrupt(&slot);

        assert_eq!(*tts.state().borrow(), TtsSessionState::Closed);
    }

    #[tokio::test]
    async fn test_settle_with_no_handle_is_immediate() {
        let controller = InterruptController::new(Duration::from_secs(1));
        let slot = TtsHandleSlot::new();

        controller.begin_processing();
        controller.request_interrupt(&slot);

        controller.settle_before_next(&slot).await.unwrap();
        assert_eq!(controller.phase(), InterruptPhase::Idle);
        assert!(!controller.is_interrupted());
    }

    #[tokio::test]
    async fn test_settle_waits_for_close_then_clears_flag() {
        let controller = InterruptController::new(Duration::from_secs(1));
        let slot = TtsHandleSlot::new();
        let tts = FakeTts::open(false);
        slot.install(tts.clone());

        controller.begin_processing();
        controller.request_interrupt(&slot);

        // Close lands shortly after the wait begins.
        let engine = tts.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            engine.state_tx.send_replace(TtsSessionState::Closed);
        });

        controller.settle_before_next(&slot).await.unwrap();
        assert!(!slot.is_occupied());
        assert!(!controller.is_interrupted());
        assert_eq!(controller.phase(), InterruptPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_times_out_and_forces_close() {
        let controller = InterruptController::new(Duration::from_millis(1_000));
        let slot = TtsHandleSlot::new();
        // Never transitions to Closed, not even on request.
        let tts = FakeTts::open(false);
        slot.install(tts.clone());

        controller.begin_processing();
        controller.request_interrupt(&slot);

        let result = controller.settle_before_next(&slot).await;
        assert!(matches!(result, Err(PipelineError::TtsCloseTimeout(_))));
        assert_eq!(controller.phase(), InterruptPhase::Failed);
        // Handle is treated as closed so the session cannot wedge.
        assert!(!slot.is_occupied());

        controller.recover();
        assert_eq!(controller.phase(), InterruptPhase::Idle);
        assert!(!controller.is_interrupted());
    }
}
