//! Tenant profiles and directory
//!
//! A tenant profile carries the business-facing conversation configuration
//! and the provider credentials a session needs. In production the platform's
//! CRUD layer feeds this directory; locally it is loaded from a YAML file.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use voicebridge_core::ConversationContext;

use crate::ConfigError;

/// Provider credentials for one tenant.
///
/// Every field is required for a session to start; missing values are a
/// fatal configuration error at connection time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderCredentials {
    #[serde(default)]
    pub stt_api_key: String,

    #[serde(default)]
    pub tts_api_key: String,

    #[serde(default)]
    pub chat_api_key: String,

    /// Tenant-selected chat model; falls back to the platform default
    #[serde(default)]
    pub chat_model: Option<String>,

    /// Tenant-selected TTS voice
    #[serde(default)]
    pub tts_voice: Option<String>,
}

impl ProviderCredentials {
    /// Names of required credentials that are absent.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.stt_api_key.trim().is_empty() {
            missing.push("stt_api_key");
        }
        if self.tts_api_key.trim().is_empty() {
            missing.push("tts_api_key");
        }
        if self.chat_api_key.trim().is_empty() {
            missing.push("chat_api_key");
        }
        missing
    }
}

/// One tenant's configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantProfile {
    /// Stable tenant/business identifier
    pub business_id: String,

    /// Human-readable name, for logging only
    #[serde(default)]
    pub display_name: String,

    /// Conversation context (personality, currency, instructions)
    #[serde(default)]
    pub context: ConversationContext,

    /// Provider credentials
    #[serde(default)]
    pub credentials: ProviderCredentials,
}

impl TenantProfile {
    /// Verify that all required credentials are present.
    pub fn verify_credentials(&self) -> Result<(), ConfigError> {
        let missing = self.credentials.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials {
                tenant: self.business_id.clone(),
                missing,
            })
        }
    }
}

/// Serialized shape of the tenant directory file
#[derive(Debug, Deserialize)]
struct TenantsFile {
    tenants: Vec<TenantProfile>,
}

/// In-memory tenant directory keyed by business id.
#[derive(Default)]
pub struct TenantDirectory {
    tenants: DashMap<String, TenantProfile>,
}

impl TenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a directory from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let file: TenantsFile = serde_yaml::from_str(&raw)?;

        let directory = Self::new();
        for profile in file.tenants {
            directory.insert(profile);
        }
        tracing::info!(
            path = %path.display(),
            tenants = directory.len(),
            "Loaded tenant directory"
        );
        Ok(directory)
    }

    pub fn insert(&self, profile: TenantProfile) {
        self.tenants.insert(profile.business_id.clone(), profile);
    }

    pub fn get(&self, business_id: &str) -> Option<TenantProfile> {
        self.tenants.get(business_id).map(|p| p.value().clone())
    }

    /// Resolve a tenant or fail with the fatal session-start error.
    pub fn resolve(&self, business_id: &str) -> Result<TenantProfile, ConfigError> {
        self.get(business_id)
            .ok_or_else(|| ConfigError::UnknownTenant(business_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> TenantProfile {
        TenantProfile {
            business_id: id.to_string(),
            display_name: "Test".to_string(),
            context: ConversationContext::default(),
            credentials: ProviderCredentials {
                stt_api_key: "stt-key".into(),
                tts_api_key: "tts-key".into(),
                chat_api_key: "chat-key".into(),
                chat_model: None,
                tts_voice: None,
            },
        }
    }

    #[test]
    fn test_resolve_known_tenant() {
        let directory = TenantDirectory::new();
        directory.insert(profile("acme"));

        let resolved = directory.resolve("acme").unwrap();
        assert_eq!(resolved.business_id, "acme");
        resolved.verify_credentials().unwrap();
    }

    #[test]
    fn test_unknown_tenant_is_error() {
        let directory = TenantDirectory::new();
        assert!(matches!(
            directory.resolve("nobody"),
            Err(ConfigError::UnknownTenant(_))
        ));
    }

    #[test]
    fn test_missing_credentials_reported_by_name() {
        let mut p = profile("acme");
        p.credentials.tts_api_key = String::new();

        match p.verify_credentials() {
            Err(ConfigError::MissingCredentials { missing, .. }) => {
                assert_eq!(missing, vec!["tts_api_key"]);
            }
            other => panic!("expected MissingCredentials, got {:?}", other),
        }
    }

    #[test]
    fn test_yaml_roundtrip() {
        let yaml = r#"
tenants:
  - business_id: bloom-florists
    display_name: Bloom Florists
    context:
      personality: "You are the Bloom Florists assistant."
      currency: EUR
      instructions: "Never promise same-day delivery."
    credentials:
      stt_api_key: sk-stt
      tts_api_key: sk-tts
      chat_api_key: sk-chat
      tts_voice: aura-luna-en
"#;
        let file: TenantsFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.tenants.len(), 1);
        let p = &file.tenants[0];
        assert_eq!(p.context.currency, "EUR");
        assert_eq!(p.credentials.tts_voice.as_deref(), Some("aura-luna-en"));
        p.verify_credentials().unwrap();
    }
}
