//! Prometheus metrics
//!
//! Counters and gauges for session lifecycle and conversation outcomes.
//! Outbound events are recorded at the transport pump, the single point
//! every client-visible event passes through.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use voicebridge_core::ServerEvent;

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder");

    describe_gauge!("voicebridge_sessions_active", "Live WebSocket sessions");
    describe_counter!(
        "voicebridge_sessions_total",
        "Sessions opened since startup"
    );
    describe_counter!(
        "voicebridge_responses_total",
        "Assistant responses completed (ai_done sent)"
    );
    describe_counter!("voicebridge_interrupts_total", "Client interrupts handled");
    describe_counter!(
        "voicebridge_queue_rejections_total",
        "Transcripts dropped because the queue was full"
    );
    describe_counter!(
        "voicebridge_errors_total",
        "Utterance-scoped errors reported to clients"
    );

    handle
}

pub fn record_session_opened() {
    counter!("voicebridge_sessions_total").increment(1);
    gauge!("voicebridge_sessions_active").increment(1.0);
}

pub fn record_session_closed() {
    gauge!("voicebridge_sessions_active").decrement(1.0);
}

/// Record conversation outcomes as events flow to the client.
pub fn record_outbound_event(event: &ServerEvent) {
    match event {
        ServerEvent::AiDone => counter!("voicebridge_responses_total").increment(1),
        ServerEvent::InterruptAck { .. } => {
            counter!("voicebridge_interrupts_total").increment(1)
        }
        ServerEvent::Busy { .. } => {
            counter!("voicebridge_queue_rejections_total").increment(1)
        }
        ServerEvent::Error { .. } => counter!("voicebridge_errors_total").increment(1),
        _ => {}
    }
}
