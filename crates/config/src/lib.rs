//! Configuration management for voicebridge
//!
//! Supports loading configuration from:
//! - YAML files (`config/default.yaml`, `config/{env}.yaml`)
//! - Environment variables (`VOICEBRIDGE__` prefix)
//!
//! Tenant profiles (personality, currency, instructions, provider
//! credentials) are loaded separately from a YAML tenant directory; in
//! production they come from the platform's CRUD layer.

pub mod constants;
pub mod settings;
pub mod tenants;

pub use settings::{
    load_settings, ChatDefaults, OrchestratorConfig, ProviderDefaults, RateLimitConfig,
    RuntimeEnvironment, ServerConfig, Settings, SttDefaults, TtsDefaults,
};
pub use tenants::{ProviderCredentials, TenantDirectory, TenantProfile};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("Missing credentials for tenant {tenant}: {missing:?}")]
    MissingCredentials {
        tenant: String,
        missing: Vec<&'static str>,
    },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
