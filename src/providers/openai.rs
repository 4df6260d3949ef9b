// src/providers/openai.rs
// OpenAI-compatible chat completions. AIML and Together reuse this adapter
// with their own base URLs; only the field shaping below is model-aware.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{chat_messages, ChatMessage, Completion, CompletionAdapter, CompletionRequest, ProviderError};

/// Models that take `max_completion_tokens` instead of `max_tokens`.
const MAX_COMPLETION_TOKEN_MODELS: [&str; 4] = ["o1-mini", "o1-preview", "gpt-4o-mini", "gpt-4o"];

/// Models that reject a frequency penalty outright.
const PENALTY_EXEMPT_MODELS: [&str; 4] = ["gemini-1.5-flash", "gpt-4o-mini", "o1-mini", "o1-preview"];

/// Models that only accept temperature 1, whatever the caller configured.
const FIXED_TEMPERATURE_MODELS: [&str; 2] = ["o1-mini", "o1-preview"];

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f32,
    pub n: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
}

/// Shapes one completion call. A total function of (model, regenerate flag):
/// the same inputs always produce the same payload.
pub fn build_chat_completion(request: &CompletionRequest<'_>) -> ChatCompletionRequest {
    let model = request.model;
    let mut options = ChatCompletionRequest {
        messages: chat_messages(request.history, request.text),
        model: model.to_string(),
        temperature: request.temperature,
        n: 1,
        max_tokens: None,
        max_completion_tokens: None,
        frequency_penalty: None,
    };

    if MAX_COMPLETION_TOKEN_MODELS.contains(&model) {
        options.max_completion_tokens = Some(request.max_tokens);
    } else {
        options.max_tokens = Some(request.max_tokens);
    }
    if !PENALTY_EXEMPT_MODELS.contains(&model) {
        options.frequency_penalty = Some(if request.regenerate { 2.0 } else { 0.0 });
    }
    if FIXED_TEMPERATURE_MODELS.contains(&model) {
        options.temperature = 1.0;
    }

    options
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl CompletionAdapter for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, ProviderError> {
        let body = build_chat_completion(request);
        tracing::debug!("chat completion request: model={}, {} messages", body.model, body.messages.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(120))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Api { status: status.as_u16(), body: text });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(format!("{}: {}", e, text)))?;
        let generated_text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Malformed("no completion content in response".to_string()))?;

        Ok(Completion {
            generated_text,
            input_units: parsed.usage.prompt_tokens,
            output_units: parsed.usage.completion_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Turn;

    fn request<'a>(model: &'a str, regenerate: bool, history: &'a [Turn]) -> CompletionRequest<'a> {
        CompletionRequest {
            model,
            temperature: 0.7,
            max_tokens: 2048,
            history,
            text: "hi",
            regenerate,
        }
    }

    #[test]
    fn test_default_family_uses_max_tokens_and_penalty() {
        let options = build_chat_completion(&request("claude-3-5-sonnet-20240620", false, &[]));
        assert_eq!(options.max_tokens, Some(2048));
        assert_eq!(options.max_completion_tokens, None);
        assert_eq!(options.frequency_penalty, Some(0.0));
        assert_eq!(options.temperature, 0.7);
        assert_eq!(options.n, 1);
    }

    #[test]
    fn test_regenerate_sets_penalty_to_two() {
        let options = build_chat_completion(&request("gpt-4o", true, &[]));
        assert_eq!(options.frequency_penalty, Some(2.0));
        let options = build_chat_completion(&request("gpt-4o", false, &[]));
        assert_eq!(options.frequency_penalty, Some(0.0));
    }

    #[test]
    fn test_penalty_exempt_models_omit_the_field() {
        for model in ["gemini-1.5-flash", "gpt-4o-mini", "o1-mini", "o1-preview"] {
            let options = build_chat_completion(&request(model, true, &[]));
            assert_eq!(options.frequency_penalty, None, "model {model} must not carry a penalty");
        }
    }

    #[test]
    fn test_max_completion_tokens_family() {
        for model in ["o1-mini", "o1-preview", "gpt-4o-mini", "gpt-4o"] {
            let options = build_chat_completion(&request(model, false, &[]));
            assert_eq!(options.max_completion_tokens, Some(2048));
            assert_eq!(options.max_tokens, None);
        }
    }

    #[test]
    fn test_fixed_temperature_models_ignore_configured_value() {
        let options = build_chat_completion(&request("o1-mini", false, &[]));
        assert_eq!(options.temperature, 1.0);
        let options = build_chat_completion(&request("o1-preview", false, &[]));
        assert_eq!(options.temperature, 1.0);
        let options = build_chat_completion(&request("gpt-4o", false, &[]));
        assert_eq!(options.temperature, 0.7);
    }

    #[test]
    fn test_history_precedes_new_user_turn() {
        let history = vec![
            Turn { role: "user".into(), message: "first".into() },
            Turn { role: "assistant".into(), message: "second".into() },
        ];
        let options = build_chat_completion(&request("gpt-4o", false, &history));
        assert_eq!(options.messages.len(), 3);
        assert_eq!(options.messages[2].content, "hi");
    }

    #[test]
    fn test_payload_is_deterministic() {
        let options = build_chat_completion(&request("gpt-4o-mini", false, &[]));
        let first = serde_json::to_string(&options).unwrap();
        let options = build_chat_completion(&request("gpt-4o-mini", false, &[]));
        let second = serde_json::to_string(&options).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            r#"{"messages":[{"role":"user","content":"hi"}],"model":"gpt-4o-mini","temperature":0.7,"n":1,"max_completion_tokens":2048}"#
        );
    }
}
