//! Per-tenant conversation context

use serde::{Deserialize, Serialize};

/// Tenant-scoped conversation configuration supplied by the platform's CRUD
/// layer at session start. Immutable for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Assistant personality description, prepended to the system prompt
    #[serde(default)]
    pub personality: String,
    /// ISO currency code used when the assistant quotes prices
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Free-form tenant instructions appended to the system prompt
    #[serde(default)]
    pub instructions: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            personality: String::new(),
            currency: default_currency(),
            instructions: String::new(),
        }
    }
}

impl ConversationContext {
    /// Render the system prompt for a chat-completion call.
    pub fn system_prompt(&self) -> String {
        let mut prompt = String::new();
        if self.personality.is_empty() {
            prompt.push_str("You are a helpful voice assistant.");
        } else {
            prompt.push_str(&self.personality);
        }
        prompt.push_str(
            " Respond concisely and naturally. Keep responses brief as they will be spoken aloud.",
        );
        prompt.push_str(&format!(" Quote prices in {}.", self.currency));
        if !self.instructions.is_empty() {
            prompt.push('\n');
            prompt.push_str(&self.instructions);
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_includes_tenant_config() {
        let ctx = ConversationContext {
            personality: "You are Maya, the florist's assistant.".into(),
            currency: "EUR".into(),
            instructions: "Never promise same-day delivery.".into(),
        };
        let prompt = ctx.system_prompt();
        assert!(prompt.contains("Maya"));
        assert!(prompt.contains("EUR"));
        assert!(prompt.contains("same-day delivery"));
    }
}
