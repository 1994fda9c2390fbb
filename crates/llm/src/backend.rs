//! OpenAI-compatible streaming backend
//!
//! Speaks the `/chat/completions` SSE protocol. One request per utterance;
//! the stream is lazy and abandoning it drops the HTTP request, which is how
//! the orchestrator's cooperative interruption stops generation.

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use voicebridge_core::{
    ChatCompletion, ChatStream, Error as CoreError, FinishReason, GenerateRequest, Message, Role,
    StreamChunk,
};

use crate::LlmError;

/// Configuration for the OpenAI-compatible backend
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base endpoint, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    /// API key sent as a bearer token
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat backend
pub struct OpenAiChatBackend {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiChatBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration(
                "Chat API key not set for this tenant".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn wire_messages(request: &GenerateRequest) -> Vec<WireMessage<'_>> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: &request.system,
        });
        for m in &request.messages {
            messages.push(WireMessage {
                role: role_name(m),
                content: &m.content,
            });
        }
        messages
    }

    fn parse_finish(reason: &str) -> FinishReason {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            _ => FinishReason::Stop,
        }
    }
}

fn role_name(message: &Message) -> &'static str {
    match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

impl ChatCompletion for OpenAiChatBackend {
    fn generate_stream(&self, request: GenerateRequest) -> ChatStream {
        let client = self.client.clone();
        let endpoint = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        let api_key = self.config.api_key.clone();
        let model = self.config.model.clone();

        Box::pin(async_stream::stream! {
            let body = serde_json::to_value(ChatCompletionRequest {
                model: &model,
                messages: OpenAiChatBackend::wire_messages(&request),
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                stream: true,
            });
            let body = match body {
                Ok(body) => body,
                Err(e) => {
                    yield Err(CoreError::Chat(e.to_string()));
                    return;
                }
            };

            let response = client
                .post(&endpoint)
                .bearer_auth(&api_key)
                .json(&body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    yield Err(LlmError::from(e).into());
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                yield Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                }
                .into());
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(part) = bytes.next().await {
                let part = match part {
                    Ok(part) => part,
                    Err(e) => {
                        yield Err(LlmError::from(e).into());
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&part));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data.is_empty() {
                        continue;
                    }
                    if data == "[DONE]" {
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(parsed) => {
                            let Some(choice) = parsed.choices.into_iter().next() else {
                                continue;
                            };
                            let delta = choice.delta.content.unwrap_or_default();
                            let finish = choice
                                .finish_reason
                                .as_deref()
                                .map(OpenAiChatBackend::parse_finish);
                            if delta.is_empty() && finish.is_none() {
                                continue;
                            }
                            yield Ok(StreamChunk { delta, finish });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping malformed SSE payload");
                        }
                    }
                }
            }
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_api_key() {
        let config = OpenAiConfig::new("https://api.openai.com/v1", "", "gpt-4o-mini");
        assert!(matches!(
            OpenAiChatBackend::new(config),
            Err(LlmError::Configuration(_))
        ));
    }

    #[test]
    fn test_wire_messages_start_with_system() {
        let request = GenerateRequest::new("be brief").with_user_message("hello");
        let messages = OpenAiChatBackend::wire_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "hello");
    }

    #[test]
    fn test_stream_payload_parsing() {
        let data = r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("Hi"));

        let done = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let parsed: StreamResponse = serde_json::from_str(done).unwrap();
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("stop"));
    }
}
