//! Centralized constants for the orchestrator
//!
//! Single source of truth for queue bounds, lifecycle wait budgets, and
//! provider endpoint defaults used across the codebase.

/// Transcript queue bounds
pub mod queue {
    /// Default queue capacity per session
    pub const DEFAULT_CAPACITY: usize = 5;
}

/// Bounded waits on TTS session lifecycle transitions
pub mod tts_waits {
    /// Poll interval while waiting for a TTS session to open (ms)
    pub const OPEN_POLL_MS: u64 = 100;

    /// Maximum polls while waiting for open (total ≈ 5 s)
    pub const OPEN_MAX_POLLS: u32 = 50;

    /// Poll interval while waiting for a TTS session to close (ms)
    pub const CLOSE_POLL_MS: u64 = 50;

    /// Maximum polls while waiting for close (total ≈ 1 s)
    pub const CLOSE_MAX_POLLS: u32 = 20;

    /// Grace delay before closing, so trailing audio can flush (ms)
    pub const CLOSE_GRACE_MS: u64 = 200;
}

/// Service endpoints (defaults for local development)
pub mod endpoints {
    /// OpenAI-compatible chat completion endpoint
    pub const CHAT_DEFAULT: &str = "https://api.openai.com/v1";

    /// Ollama endpoint for local models
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434/v1";
}

/// Timeouts (in milliseconds unless noted)
pub mod timeouts {
    /// Chat-completion request timeout (ms)
    pub const CHAT_REQUEST_MS: u64 = 60_000;

    /// Idle session expiry (seconds)
    pub const SESSION_IDLE_SECS: u64 = 3_600;

    /// Session cleanup sweep interval (seconds)
    pub const SESSION_CLEANUP_SECS: u64 = 300;
}

/// Per-connection rate limits
pub mod rate_limits {
    /// Control messages per second
    pub const MAX_MESSAGES_PER_SEC: u32 = 50;

    /// Inbound audio bytes per second (16 kHz, 16-bit mono ≈ 32 KB/s,
    /// with generous headroom for batching)
    pub const MAX_AUDIO_BYTES_PER_SEC: usize = 256 * 1024;
}
