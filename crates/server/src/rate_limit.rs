//! Per-connection rate limiting
//!
//! Simple fixed-window limiter for control messages and inbound audio
//! bandwidth. One limiter per connection, owned by the socket task.

use std::time::{Duration, Instant};
use thiserror::Error;

use voicebridge_config::RateLimitConfig;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("too many messages")]
    Messages,

    #[error("audio bandwidth exceeded")]
    AudioBandwidth,
}

/// Fixed one-second window limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    window_start: Instant,
    messages: u32,
    audio_bytes: usize,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            window_start: Instant::now(),
            messages: 0,
            audio_bytes: 0,
        }
    }

    fn roll_window(&mut self) {
        if self.window_start.elapsed() >= Duration::from_secs(1) {
            self.window_start = Instant::now();
            self.messages = 0;
            self.audio_bytes = 0;
        }
    }

    /// Account one control message.
    pub fn check_message(&mut self) -> Result<(), RateLimitError> {
        self.roll_window();
        if self.messages >= self.config.max_messages_per_sec {
            return Err(RateLimitError::Messages);
        }
        self.messages += 1;
        Ok(())
    }

    /// Account `len` bytes of inbound audio.
    pub fn check_audio(&mut self, len: usize) -> Result<(), RateLimitError> {
        self.roll_window();
        if self.audio_bytes + len > self.config.max_audio_bytes_per_sec {
            return Err(RateLimitError::AudioBandwidth);
        }
        self.audio_bytes += len;
        Ok(())
    }
}
