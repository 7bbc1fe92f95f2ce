//! Narrative generator abstraction
//!
//! Supported providers:
//! - OpenAI-compatible chat completions endpoints
//! - Static text (local development and tests)

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_PROMPT: &str =
    "You are a registered behavior technician writing session notes for a clinical record.";

/// Text returned by the generator with whatever it reported about the call
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub text: String,
    /// Model name, token usage and reasoning when present
    pub metadata: Value,
}

/// Trait for narrative generation
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Turn a prompt into narrative text
    async fn generate(&self, prompt: &str) -> Result<Narrative>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Chat completions client
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Value>,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl NarrativeGenerator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &str) -> Result<Narrative> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: ChatResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse response: {}", e),
        })?;

        let model = result.model.unwrap_or_else(|| self.model.clone());
        let message = result
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| AppError::Generation {
                message: "Empty response".to_string(),
            })?;

        let text = message
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::Generation {
                message: "Response contained no text".to_string(),
            })?;

        let mut metadata = json!({ "model": model });
        if let Some(usage) = result.usage {
            metadata["usage"] = usage;
        }
        if let Some(reasoning) = message.reasoning {
            metadata["reasoning"] = Value::String(reasoning);
        }

        Ok(Narrative { text, metadata })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Returns the same text for every prompt
pub struct StaticGenerator {
    text: String,
}

impl StaticGenerator {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl NarrativeGenerator for StaticGenerator {
    async fn generate(&self, _prompt: &str) -> Result<Narrative> {
        Ok(Narrative {
            text: self.text.clone(),
            metadata: json!({ "model": self.model_name() }),
        })
    }

    fn model_name(&self) -> &str {
        "static"
    }
}

/// Create a generator based on configuration
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn NarrativeGenerator>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "generation.api_key is required for the openai provider".to_string(),
            })?;
            Ok(Arc::new(ChatCompletionsGenerator::new(config, key)?))
        }
        "static" => Ok(Arc::new(StaticGenerator::new(
            "Session notes are not available in this environment.",
        ))),
        other => Err(AppError::Configuration {
            message: format!("Unknown generation provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_generator() {
        let generator = StaticGenerator::new("T");
        let narrative = generator.generate("anything").await.unwrap();
        assert_eq!(narrative.text, "T");
        assert_eq!(narrative.metadata["model"], "static");
    }

    #[test]
    fn test_openai_requires_key() {
        let config = GenerationConfig {
            api_key: None,
            ..Default::default()
        };
        assert!(matches!(
            create_generator(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_unknown_provider() {
        let config = GenerationConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        assert!(create_generator(&config).is_err());
    }

    #[test]
    fn test_response_metadata_shape() {
        let parsed: ChatResponse = serde_json::from_value(json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {"content": " Narrative. "}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 20}
        }))
        .unwrap();

        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.usage.unwrap()["completion_tokens"], 20);
    }
}
