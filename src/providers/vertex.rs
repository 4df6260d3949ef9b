// src/providers/vertex.rs
// Gemini generateContent dialect: role/content pairs become role/parts, and
// the assistant role token is renamed to "model".
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Completion, CompletionAdapter, CompletionRequest, ProviderError};

#[derive(Debug, Clone)]
pub struct VertexClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    pub max_output_tokens: u32,
}

pub fn build_generate_content(request: &CompletionRequest<'_>) -> GenerateContentRequest {
    let mut contents: Vec<Content> = request
        .history
        .iter()
        .map(|turn| Content {
            role: if turn.role == "assistant" { "model".to_string() } else { turn.role.clone() },
            parts: vec![Part { text: turn.message.clone() }],
        })
        .collect();
    contents.push(Content {
        role: "user".to_string(),
        parts: vec![Part { text: request.text.to_string() }],
    });

    GenerateContentRequest {
        contents,
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    pub candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
pub struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    pub prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount")]
    pub candidates_token_count: u32,
}

impl VertexClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

#[async_trait]
impl CompletionAdapter for VertexClient {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, ProviderError> {
        let body = build_generate_content(request);
        tracing::debug!("vertex request: model={}, {} contents", request.model, body.contents.len());

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, request.model))
            .query(&[("key", self.api_key.as_str())])
            .timeout(Duration::from_secs(120))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Api { status: status.as_u16(), body: text });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(format!("{}: {}", e, text)))?;
        let generated_text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ProviderError::Malformed("no candidate content in response".to_string()))?;
        let usage = parsed
            .usage_metadata
            .ok_or_else(|| ProviderError::Malformed("missing usage metadata in response".to_string()))?;

        Ok(Completion {
            generated_text,
            input_units: usage.prompt_token_count,
            output_units: usage.candidates_token_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Turn;

    #[test]
    fn test_history_wraps_parts_and_renames_assistant() {
        let history = vec![
            Turn { role: "user".into(), message: "hello".into() },
            Turn { role: "assistant".into(), message: "hi".into() },
        ];
        let request = CompletionRequest {
            model: "gemini-1.5-flash",
            temperature: 0.7,
            max_tokens: 2048,
            history: &history,
            text: "again?",
            regenerate: false,
        };
        let body = build_generate_content(&request);
        assert_eq!(body.contents.len(), 3);
        assert_eq!(body.contents[0].role, "user");
        assert_eq!(body.contents[1].role, "model");
        assert_eq!(body.contents[1].parts, vec![Part { text: "hi".into() }]);
        assert_eq!(body.contents[2].role, "user");
        assert_eq!(body.contents[2].parts[0].text, "again?");
        assert_eq!(body.generation_config.max_output_tokens, 2048);
    }

    #[test]
    fn test_generation_config_field_names() {
        let request = CompletionRequest {
            model: "gemini-1.5-flash",
            temperature: 0.5,
            max_tokens: 100,
            history: &[],
            text: "hi",
            regenerate: false,
        };
        let json = serde_json::to_string(&build_generate_content(&request)).unwrap();
        assert!(json.contains("\"generationConfig\""));
        assert!(json.contains("\"maxOutputTokens\":100"));
        assert!(!json.contains("max_tokens"));
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "candidates": [{"content": {"role": "model", "parts": [{"text": "a"}, {"text": "b"}]}}],
            "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 3, "totalTokenCount": 8}
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let usage = parsed.usage_metadata.unwrap();
        assert_eq!(usage.prompt_token_count, 5);
        assert_eq!(usage.candidates_token_count, 3);
    }
}
