// src/providers/anthropic.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{chat_messages, ChatMessage, Completion, CompletionAdapter, CompletionRequest, ProviderError};

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Anthropic takes the shared `{role, content}` history unchanged and has no
/// penalty or per-model field variants.
pub fn build_message_request(request: &CompletionRequest<'_>) -> MessageRequest {
    MessageRequest {
        messages: chat_messages(request.history, request.text),
        model: request.model.to_string(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub content: Vec<ResponseContent>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseContent {
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.anthropic.com/v1".to_string(),
        }
    }
}

#[async_trait]
impl CompletionAdapter for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, ProviderError> {
        let body = build_message_request(request);
        tracing::debug!("anthropic request: model={}, {} messages", body.model, body.messages.len());

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .timeout(Duration::from_secs(120))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Api { status: status.as_u16(), body: text });
        }

        let parsed: MessageResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(format!("{}: {}", e, text)))?;
        let generated_text = parsed
            .content
            .into_iter()
            .next()
            .map(|block| match block {
                ResponseContent::Text { text } => text,
            })
            .ok_or_else(|| ProviderError::Malformed("no text content in response".to_string()))?;

        Ok(Completion {
            generated_text,
            input_units: parsed.usage.input_tokens,
            output_units: parsed.usage.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Turn;

    #[test]
    fn test_build_message_request() {
        let history = vec![Turn { role: "user".into(), message: "hello".into() },
                           Turn { role: "assistant".into(), message: "hi".into() }];
        let request = CompletionRequest {
            model: "claude-3-haiku-20240307",
            temperature: 0.4,
            max_tokens: 1024,
            history: &history,
            text: "and now?",
            regenerate: true,
        };
        let body = build_message_request(&request);
        assert_eq!(body.model, "claude-3-haiku-20240307");
        assert_eq!(body.temperature, 0.4);
        assert_eq!(body.max_tokens, 1024);
        assert_eq!(body.messages.len(), 3);
        // regenerate has no effect on this dialect
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("frequency_penalty"));
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "content": [{"type": "text", "text": "hello back"}],
            "usage": {"input_tokens": 12, "output_tokens": 7}
        }"#;
        let parsed: MessageResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.usage.input_tokens, 12);
        assert_eq!(parsed.usage.output_tokens, 7);
        let ResponseContent::Text { text } = &parsed.content[0];
        assert_eq!(text, "hello back");
    }
}
