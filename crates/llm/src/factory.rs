//! Chat backend factory

use std::sync::Arc;
use std::time::Duration;

use voicebridge_config::{ChatDefaults, ProviderCredentials};
use voicebridge_core::ChatCompletion;

use crate::backend::{OpenAiChatBackend, OpenAiConfig};
use crate::LlmError;

/// Builds per-tenant chat backends from platform defaults and tenant
/// credentials. The tenant's model choice overrides the platform default.
pub struct ChatFactory;

impl ChatFactory {
    pub fn create(
        defaults: &ChatDefaults,
        credentials: &ProviderCredentials,
    ) -> Result<Arc<dyn ChatCompletion>, LlmError> {
        let model = credentials
            .chat_model
            .clone()
            .unwrap_or_else(|| defaults.model.clone());

        let config = OpenAiConfig::new(&defaults.endpoint, &credentials.chat_api_key, model)
            .with_timeout(Duration::from_millis(defaults.timeout_ms));

        let backend = OpenAiChatBackend::new(config)?;
        tracing::debug!(model = backend.model_name(), "Chat backend created");
        Ok(Arc::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_model_overrides_default() {
        let defaults = ChatDefaults::default();
        let credentials = ProviderCredentials {
            chat_api_key: "sk-test".into(),
            chat_model: Some("gpt-4o".into()),
            ..Default::default()
        };

        let backend = ChatFactory::create(&defaults, &credentials).unwrap();
        assert_eq!(backend.model_name(), "gpt-4o");
    }

    #[test]
    fn test_missing_key_fails() {
        let defaults = ChatDefaults::default();
        let credentials = ProviderCredentials::default();
        assert!(ChatFactory::create(&defaults, &credentials).is_err());
    }
}
