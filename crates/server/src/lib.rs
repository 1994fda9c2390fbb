//! Voicebridge server
//!
//! WebSocket endpoint for realtime voice conversations, plus health and
//! metrics endpoints. One session per connection; all conversation logic
//! lives in `voicebridge-pipeline`.

pub mod http;
pub mod metrics;
pub mod rate_limit;
pub mod session;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use metrics::{init_metrics, record_outbound_event, record_session_closed, record_session_opened};
pub use rate_limit::{RateLimitError, RateLimiter};
pub use session::{Session, SessionRegistry};
pub use state::AppState;
pub use websocket::WebSocketHandler;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Internal error: {0}")]
    Internal(String),
}
