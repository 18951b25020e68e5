//! Async LLM client for chat replies and command reinterpretation
//!
//! This is a model-agnostic HTTP client for calling LLM APIs.
//! Supports both Anthropic and OpenAI-compatible APIs (DeepSeek, llama.cpp
//! server, Ollama, etc). Grammar matching always runs first; the model is
//! only asked to reword input that matched nothing, and to answer `chat`.

use crate::core::config::ModelConfig;
use crate::core::error::{AssistantError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// API format type
#[derive(Debug, Clone, PartialEq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

/// Async LLM client for making API calls
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    api_format: ApiFormat,
}

impl LlmClient {
    /// Create a new LLM client with explicit configuration
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        let api_format = Self::detect_api_format(&api_url);
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
            max_tokens: 1024,
            api_format,
        }
    }

    /// Detect API format from URL
    fn detect_api_format(url: &str) -> ApiFormat {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            // DeepSeek, OpenAI, and local servers use the OpenAI format
            ApiFormat::OpenAI
        }
    }

    /// Create a client from the model section of the configuration
    ///
    /// The API key is read from the environment variable named by
    /// `api_key_env`. Local OpenAI-compatible servers usually need no key,
    /// so a missing variable is only an error for Anthropic endpoints.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) => key,
            Err(_) if Self::detect_api_format(&config.api_url) == ApiFormat::OpenAI => String::new(),
            Err(_) => {
                return Err(AssistantError::LlmError(format!(
                    "{} not set",
                    config.api_key_env
                )))
            }
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AssistantError::LlmError(e.to_string()))?;

        let mut llm = Self::new(api_key, config.api_url.clone(), config.model.clone());
        llm.client = client;
        llm.max_tokens = config.max_tokens;
        Ok(llm)
    }

    /// Send a multi-turn conversation to the LLM
    pub async fn complete_chat(&self, system: &str, messages: &[Message]) -> Result<String> {
        match self.api_format {
            ApiFormat::Anthropic => self.complete_anthropic(system, messages).await,
            ApiFormat::OpenAI => self.complete_openai(system, messages).await,
        }
    }

    async fn complete_anthropic(&self, system: &str, messages: &[Message]) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.into(),
            messages: messages.to_vec(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistantError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AssistantError::LlmError(format!("API error: {}", error_text)));
        }

        let completion: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::LlmError(e.to_string()))?;

        completion
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| AssistantError::LlmError("Empty response".into()))
    }

    async fn complete_openai(&self, system: &str, messages: &[Message]) -> Result<String> {
        let mut all_messages = Vec::with_capacity(messages.len() + 1);
        all_messages.push(Message::system(system));
        all_messages.extend_from_slice(messages);

        let request = OpenAIRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: all_messages,
        };

        let mut builder = self
            .client
            .post(&self.api_url)
            .header("content-type", "application/json");
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistantError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AssistantError::LlmError(format!("API error: {}", error_text)));
        }

        let completion: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::LlmError(e.to_string()))?;

        completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| AssistantError::LlmError("Empty response".into()))
    }
}

// Anthropic API format
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

// OpenAI-compatible API format
#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlmClient::new(
            "test-key".into(),
            "https://api.example.com".into(),
            "test-model".into(),
        );
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.api_url, "https://api.example.com");
        assert_eq!(client.model, "test-model");
        assert_eq!(client.api_format, ApiFormat::OpenAI);
    }

    #[test]
    fn test_detect_anthropic() {
        let client = LlmClient::new(
            "k".into(),
            "https://api.anthropic.com/v1/messages".into(),
            "m".into(),
        );
        assert_eq!(client.api_format, ApiFormat::Anthropic);
    }

    #[test]
    fn test_from_config_local_server_without_key() {
        let config = ModelConfig {
            api_url: "http://localhost:8080/v1/chat/completions".into(),
            api_key_env: "AZAZEL_TEST_UNSET_KEY".into(),
            max_tokens: 64,
            ..ModelConfig::default()
        };
        let client = LlmClient::from_config(&config).unwrap();
        assert!(client.api_key.is_empty());
        assert_eq!(client.max_tokens, 64);
    }

    #[test]
    fn test_from_config_anthropic_requires_key() {
        let config = ModelConfig {
            api_url: "https://api.anthropic.com/v1/messages".into(),
            api_key_env: "AZAZEL_TEST_UNSET_KEY".into(),
            ..ModelConfig::default()
        };
        assert!(matches!(
            LlmClient::from_config(&config),
            Err(AssistantError::LlmError(_))
        ));
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
