//! Voicebridge server entry point

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use voicebridge_config::{load_settings, Settings, TenantDirectory};
use voicebridge_core::{SpeechToText, TextToSpeech};
use voicebridge_pipeline::adapters::{NullSpeechToText, SilenceTts};
use voicebridge_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("VOICEBRIDGE_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized, use eprintln for early logging
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&settings);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?settings.environment,
        config = env.as_deref().unwrap_or("default"),
        "Starting voicebridge server"
    );

    let metrics_handle = init_metrics();
    tracing::info!("Initialized Prometheus metrics at /metrics");

    let tenants = match TenantDirectory::from_yaml_file(&settings.providers.tenants_file) {
        Ok(directory) => directory,
        Err(e) => {
            tracing::warn!(
                path = %settings.providers.tenants_file,
                error = %e,
                "No tenant directory loaded; all connections will be rejected"
            );
            TenantDirectory::new()
        }
    };

    // Local adapters stand in until vendor STT/TTS crates are wired for the
    // deployment; chat backends are created per tenant from credentials.
    let stt: Arc<dyn SpeechToText> = Arc::new(NullSpeechToText);
    let tts: Arc<dyn TextToSpeech> = Arc::new(SilenceTts::default());

    let state = AppState::new(settings.clone(), Arc::new(tenants), stt, tts);
    let _cleanup_shutdown = state.sessions.start_cleanup_task();

    let router = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "voicebridge listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.environment.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
