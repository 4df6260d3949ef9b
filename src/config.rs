// src/config.rs
// Chat configuration comes from a secrets file, re-read on every request so
// key rotations and model-list changes apply without a restart.
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::providers::ProviderKind;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(rename = "TEMPERATURE")]
    pub temperature: f32,
    #[serde(rename = "MAX_TOKENS")]
    pub max_tokens: u32,
    #[serde(rename = "PROVIDERS")]
    pub providers: Vec<ProviderConfig>,
    #[serde(rename = "COST_FACTOR", default = "default_cost_factor")]
    pub cost_factor: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default)]
    pub icon: String,
    pub id: ProviderKind,
    pub key: String,
    pub url: String,
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub provider: String,
    pub model: String,
    pub min_credits: Decimal,
}

fn default_cost_factor() -> Decimal {
    Decimal::from(1000)
}

impl ChatConfig {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn is_model_allowed(&self, provider: &str, model: &str) -> bool {
        self.provider(provider)
            .map(|p| p.model(model).is_some())
            .unwrap_or(false)
    }
}

impl ProviderConfig {
    pub fn model(&self, model: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.model == model)
    }
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    #[serde(rename = "CHAT_CONFIG")]
    chat_config: ChatConfig,
}

/// Reads the secrets file and returns the chat configuration. Any read or
/// parse failure fails the whole request.
pub fn fetch_secret() -> Result<ChatConfig, ChatError> {
    let path = std::env::var("CHAT_SECRETS_PATH").unwrap_or_else(|_| "secrets.json".to_string());
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| ChatError::Config(format!("reading {}: {}", path, e)))?;
    let secrets: SecretsFile = serde_json::from_str(&raw)
        .map_err(|e| ChatError::Config(format!("parsing {}: {}", path, e)))?;
    Ok(secrets.chat_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "CHAT_CONFIG": {
            "TEMPERATURE": 0.7,
            "MAX_TOKENS": 2048,
            "PROVIDERS": [
                {
                    "name": "OpenAI",
                    "icon": "openai.svg",
                    "id": "OPENAI",
                    "key": "sk-test",
                    "url": "https://api.openai.com/v1",
                    "models": [
                        {"name": "GPT-4o mini", "provider": "OpenAI", "model": "gpt-4o-mini", "min_credits": "0.05"}
                    ]
                },
                {
                    "name": "AI/ML API",
                    "id": "AIML",
                    "key": "aiml-test",
                    "url": "https://api.aimlapi.com/v1",
                    "models": [
                        {"name": "Llama 3.2 3B", "provider": "AI/ML API", "model": "meta-llama/Llama-3.2-3B-Instruct-Turbo", "min_credits": "0.01"}
                    ]
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_secrets_file() {
        let secrets: SecretsFile = serde_json::from_str(SAMPLE).unwrap();
        let config = secrets.chat_config;
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].id, ProviderKind::Aiml);
        // COST_FACTOR omitted falls back to the default
        assert_eq!(config.cost_factor, Decimal::from(1000));
    }

    #[test]
    fn test_model_lookup() {
        let secrets: SecretsFile = serde_json::from_str(SAMPLE).unwrap();
        let config = secrets.chat_config;
        assert!(config.is_model_allowed("OpenAI", "gpt-4o-mini"));
        assert!(!config.is_model_allowed("OpenAI", "gpt-4o"));
        assert!(!config.is_model_allowed("Anthropic", "claude-3-haiku-20240307"));
        let min = config.provider("OpenAI").unwrap().model("gpt-4o-mini").unwrap().min_credits;
        assert_eq!(min, Decimal::new(5, 2));
    }
}
