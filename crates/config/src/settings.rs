//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::{endpoints, queue, rate_limits, timeouts, tts_waits};
use crate::ConfigError;

/// Runtime environment enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Orchestrator configuration (queue bounds, lifecycle waits)
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Provider defaults, merged under per-tenant credentials
    #[serde(default)]
    pub providers: ProviderDefaults,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty means allow any (development)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle session expiry in seconds
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// Expired-session sweep interval in seconds
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_sessions() -> usize {
    100
}

fn default_session_timeout_secs() -> u64 {
    timeouts::SESSION_IDLE_SECS
}

fn default_cleanup_interval_secs() -> u64 {
    timeouts::SESSION_CLEANUP_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            max_sessions: default_max_sessions(),
            session_timeout_secs: default_session_timeout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Per-connection rate limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_messages_per_sec")]
    pub max_messages_per_sec: u32,

    #[serde(default = "default_max_audio_bytes_per_sec")]
    pub max_audio_bytes_per_sec: usize,
}

fn default_max_messages_per_sec() -> u32 {
    rate_limits::MAX_MESSAGES_PER_SEC
}

fn default_max_audio_bytes_per_sec() -> usize {
    rate_limits::MAX_AUDIO_BYTES_PER_SEC
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_messages_per_sec: default_max_messages_per_sec(),
            max_audio_bytes_per_sec: default_max_audio_bytes_per_sec(),
        }
    }
}

/// Orchestrator configuration: queue bounds and TTS lifecycle wait budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Transcript queue capacity per session
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Poll interval while waiting for TTS open (ms)
    #[serde(default = "default_tts_open_poll_ms")]
    pub tts_open_poll_ms: u64,

    /// Maximum polls while waiting for TTS open
    #[serde(default = "default_tts_open_max_polls")]
    pub tts_open_max_polls: u32,

    /// Poll interval while waiting for TTS close (ms)
    #[serde(default = "default_tts_close_poll_ms")]
    pub tts_close_poll_ms: u64,

    /// Maximum polls while waiting for TTS close
    #[serde(default = "default_tts_close_max_polls")]
    pub tts_close_max_polls: u32,

    /// Grace delay before closing a TTS session (ms)
    #[serde(default = "default_tts_close_grace_ms")]
    pub tts_close_grace_ms: u64,
}

fn default_queue_capacity() -> usize {
    queue::DEFAULT_CAPACITY
}

fn default_tts_open_poll_ms() -> u64 {
    tts_waits::OPEN_POLL_MS
}

fn default_tts_open_max_polls() -> u32 {
    tts_waits::OPEN_MAX_POLLS
}

fn default_tts_close_poll_ms() -> u64 {
    tts_waits::CLOSE_POLL_MS
}

fn default_tts_close_max_polls() -> u32 {
    tts_waits::CLOSE_MAX_POLLS
}

fn default_tts_close_grace_ms() -> u64 {
    tts_waits::CLOSE_GRACE_MS
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            tts_open_poll_ms: default_tts_open_poll_ms(),
            tts_open_max_polls: default_tts_open_max_polls(),
            tts_close_poll_ms: default_tts_close_poll_ms(),
            tts_close_max_polls: default_tts_close_max_polls(),
            tts_close_grace_ms: default_tts_close_grace_ms(),
        }
    }
}

impl OrchestratorConfig {
    /// Total budget for the TTS open wait (≈ 5 s by default)
    pub fn tts_open_wait(&self) -> Duration {
        Duration::from_millis(self.tts_open_poll_ms) * self.tts_open_max_polls
    }

    /// Total budget for the TTS close wait (≈ 1 s by default)
    pub fn tts_close_wait(&self) -> Duration {
        Duration::from_millis(self.tts_close_poll_ms) * self.tts_close_max_polls
    }

    pub fn tts_close_grace(&self) -> Duration {
        Duration::from_millis(self.tts_close_grace_ms)
    }
}

/// Provider defaults applied beneath per-tenant credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDefaults {
    /// Path to the tenant directory file
    #[serde(default = "default_tenants_file")]
    pub tenants_file: String,

    #[serde(default)]
    pub chat: ChatDefaults,

    #[serde(default)]
    pub stt: SttDefaults,

    #[serde(default)]
    pub tts: TtsDefaults,
}

fn default_tenants_file() -> String {
    "config/tenants.yaml".to_string()
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            tenants_file: default_tenants_file(),
            chat: ChatDefaults::default(),
            stt: SttDefaults::default(),
            tts: TtsDefaults::default(),
        }
    }
}

/// Chat-completion provider defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDefaults {
    #[serde(default = "default_chat_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_chat_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_chat_temperature")]
    pub temperature: f32,

    #[serde(default = "default_chat_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_chat_endpoint() -> String {
    endpoints::CHAT_DEFAULT.to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_chat_max_tokens() -> u32 {
    256
}

fn default_chat_temperature() -> f32 {
    0.7
}

fn default_chat_timeout_ms() -> u64 {
    timeouts::CHAT_REQUEST_MS
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            endpoint: default_chat_endpoint(),
            model: default_chat_model(),
            max_tokens: default_chat_max_tokens(),
            temperature: default_chat_temperature(),
            timeout_ms: default_chat_timeout_ms(),
        }
    }
}

/// STT provider defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttDefaults {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_stt_language")]
    pub language: String,

    #[serde(default = "default_stt_sample_rate")]
    pub sample_rate: u32,
}

fn default_stt_language() -> String {
    "en-US".to_string()
}

fn default_stt_sample_rate() -> u32 {
    16_000
}

impl Default for SttDefaults {
    fn default() -> Self {
        Self {
            endpoint: None,
            language: default_stt_language(),
            sample_rate: default_stt_sample_rate(),
        }
    }
}

/// TTS provider defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsDefaults {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_tts_sample_rate")]
    pub sample_rate: u32,
}

fn default_tts_sample_rate() -> u32 {
    24_000
}

impl Default for TtsDefaults {
    fn default() -> Self {
        Self {
            endpoint: None,
            sample_rate: default_tts_sample_rate(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.queue_capacity".to_string(),
                message: "Queue capacity must be at least 1".to_string(),
            });
        }

        if self.orchestrator.tts_open_max_polls == 0 || self.orchestrator.tts_close_max_polls == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.tts_*_max_polls".to_string(),
                message: "Lifecycle wait bounds must be at least 1 poll".to_string(),
            });
        }

        if self.server.max_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_sessions".to_string(),
                message: "Max sessions must be at least 1".to_string(),
            });
        }

        if self.environment.is_strict() && self.server.cors_origins.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.cors_origins".to_string(),
                message: "Explicit CORS origins are required outside development".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from files and environment.
///
/// Priority: env vars > config/{env}.yaml > config/default.yaml > defaults.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = Path::new("config/default.yaml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }

    if let Some(env) = env {
        let env_path = format!("config/{}.yaml", env);
        if Path::new(&env_path).exists() {
            builder = builder.add_source(File::with_name(&env_path));
        } else {
            tracing::warn!(path = %env_path, "Environment config file not found, skipping");
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICEBRIDGE")
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.orchestrator.queue_capacity, 5);
        assert_eq!(settings.orchestrator.tts_open_wait(), Duration::from_secs(5));
        assert_eq!(settings.orchestrator.tts_close_wait(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut settings = Settings::default();
        settings.orchestrator.queue_capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_strict_env_requires_cors() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        assert!(settings.validate().is_err());

        settings.server.cors_origins = vec!["https://app.example.com".to_string()];
        settings.validate().unwrap();
    }
}
