//! TTS handle slot
//!
//! Tracks the session's single open TTS handle. The coordinator installs a
//! handle when it opens a session; the audio pump clears it when the close
//! is observed; the interrupt path reads it to request close mid-response.
//! At most one handle is installed at any instant.

use parking_lot::Mutex;
use std::sync::Arc;

use voicebridge_core::TtsSession;

/// Shared, clearable reference to the active TTS session handle.
#[derive(Clone, Default)]
pub struct TtsHandleSlot {
    inner: Arc<Mutex<Option<Arc<dyn TtsSession>>>>,
}

impl TtsHandleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handle for a new response. The slot must be empty; a
    /// leftover handle indicates a missed close and is close-requested
    /// before being replaced.
    pub fn install(&self, handle: Arc<dyn TtsSession>) {
        let previous = self.inner.lock().replace(handle);
        if let Some(previous) = previous {
            tracing::warn!("Replacing TTS handle that was never observed closed");
            previous.request_close();
        }
    }

    /// Current handle, if one is installed.
    pub fn current(&self) -> Option<Arc<dyn TtsSession>> {
        self.inner.lock().clone()
    }

    pub fn is_occupied(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Clear unconditionally (forced-close path).
    pub fn clear(&self) {
        *self.inner.lock() = None;
    }

    /// Clear only if the slot still holds `handle`; a later response's
    /// handle is left untouched.
    pub fn clear_if(&self, handle: &Arc<dyn TtsSession>) {
        let mut slot = self.inner.lock();
        if let Some(current) = slot.as_ref() {
            if Arc::ptr_eq(current, handle) {
                *slot = None;
            }
        }
    }

    /// Request close of the installed handle, if any. Non-blocking.
    pub fn request_close(&self) {
        if let Some(handle) = self.current() {
            handle.request_close();
        }
    }
}
