//! Application state
//!
//! Shared state across all handlers: settings, the session registry, the
//! tenant directory, and the provider factories sessions are built from.

use parking_lot::RwLock;
use std::sync::Arc;

use voicebridge_config::{Settings, TenantDirectory};
use voicebridge_core::{SpeechToText, TextToSpeech};

use crate::session::SessionRegistry;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration, wrapped for future hot-reload
    pub config: Arc<RwLock<Settings>>,
    /// Session registry
    pub sessions: Arc<SessionRegistry>,
    /// Tenant profiles (stands in for the platform CRUD layer)
    pub tenants: Arc<TenantDirectory>,
    /// STT engine factory
    pub stt: Arc<dyn SpeechToText>,
    /// TTS engine factory
    pub tts: Arc<dyn TextToSpeech>,
}

impl AppState {
    pub fn new(
        config: Settings,
        tenants: Arc<TenantDirectory>,
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::with_config(
            config.server.max_sessions,
            config.server.session_timeout(),
            config.server.cleanup_interval(),
        ));
        Self {
            config: Arc::new(RwLock::new(config)),
            sessions,
            tenants,
            stt,
            tts,
        }
    }

    /// Get a read guard to the current configuration
    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }
}
