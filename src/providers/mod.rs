// src/providers/mod.rs
pub mod anthropic;
pub mod openai;
pub mod vertex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProviderConfig;
use crate::models::chat::Turn;

/// The closed set of provider families. Adding a provider means adding a
/// variant and an adapter; the orchestration never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "OPENAI")]
    OpenAi,
    #[serde(rename = "ANTHROPIC")]
    Anthropic,
    #[serde(rename = "AIML")]
    Aiml,
    #[serde(rename = "TOGETHER")]
    Together,
    #[serde(rename = "VERTEX")]
    Vertex,
}

impl ProviderKind {
    /// AIML and Together speak the OpenAI chat-completions dialect.
    pub fn is_openai_compatible(self) -> bool {
        matches!(self, ProviderKind::OpenAi | ProviderKind::Aiml | ProviderKind::Together)
    }

    /// AIML resells upstream capacity at a 30% premium on both rates.
    pub fn is_reseller(self) -> bool {
        matches!(self, ProviderKind::Aiml)
    }
}

/// Everything an adapter needs to shape one completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub history: &'a [Turn],
    pub text: &'a str,
    pub regenerate: bool,
}

/// Provider responses normalized to the one shape the billing pipeline
/// understands, whatever the upstream calls its unit counts.
#[derive(Debug, Clone)]
pub struct Completion {
    pub generated_text: String,
    pub input_units: u32,
    pub output_units: u32,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait CompletionAdapter {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, ProviderError>;
}

/// Invokes the single adapter matching the provider's family. Exactly one
/// provider call per request; no fallback, no retry.
pub async fn dispatch(
    provider: &ProviderConfig,
    request: &CompletionRequest<'_>,
) -> Result<Completion, ProviderError> {
    match provider.id {
        ProviderKind::OpenAi | ProviderKind::Aiml | ProviderKind::Together => {
            openai::OpenAiClient::new(provider.key.clone(), provider.url.clone())
                .complete(request)
                .await
        }
        ProviderKind::Anthropic => {
            anthropic::AnthropicClient::new(provider.key.clone())
                .complete(request)
                .await
        }
        ProviderKind::Vertex => {
            vertex::VertexClient::new(provider.key.clone())
                .complete(request)
                .await
        }
    }
}

/// Flattens prior turns and appends the new user turn, the `{role, content}`
/// shape shared by the OpenAI-compatible and Anthropic dialects.
pub fn chat_messages(history: &[Turn], text: &str) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = history
        .iter()
        .map(|turn| ChatMessage {
            role: turn.role.clone(),
            content: turn.message.clone(),
        })
        .collect();
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: text.to_string(),
    });
    messages
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}
