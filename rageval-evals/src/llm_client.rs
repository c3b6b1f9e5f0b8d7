// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Completion engine clients for model-judged metrics

use async_trait::async_trait;
use rageval_core::{ChatMessage, PromptRole};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmSettings;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Trait for chat completion clients
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send the conversation and return the raw reply text
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<LLMResponse, LLMError>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Per-call sampling parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f64,
    pub timeout: Duration,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.01,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Response from LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Errors from LLM clients
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown provider in model id '{0}'")]
    UnknownProvider(String),

    #[error("No API key configured for provider '{0}'")]
    MissingApiKey(String),
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LLMError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(LLMError::RateLimitExceeded);
    }
    let error_text = response.text().await?;
    Err(LLMError::ApiError(format!("{status}: {error_text}")))
}

fn usage_count(usage: &serde_json::Value, key: &str) -> u32 {
    usage[key].as_u64().unwrap_or(0) as u32
}

/// OpenAI client implementation
///
/// Also serves any OpenAI-compatible endpoint (DeepSeek, Ollama) through
/// [`OpenAIClient::with_base_url`].
pub struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: OPENAI_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<LLMResponse, LLMError> {
        let request = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": params.temperature,
        });

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(params.timeout)
            .header("Content-Type", "application/json")
            .json(&request);
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = check_status(builder.send().await?).await?;
        let response_data: serde_json::Value = response.json().await?;

        let content = response_data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LLMError::InvalidResponse("Missing content".to_string()))?
            .to_string();

        let usage_data = &response_data["usage"];
        let usage = TokenUsage {
            prompt_tokens: usage_count(usage_data, "prompt_tokens"),
            completion_tokens: usage_count(usage_data, "completion_tokens"),
            total_tokens: usage_count(usage_data, "total_tokens"),
        };

        Ok(LLMResponse {
            content,
            usage,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Anthropic Claude client implementation
pub struct AnthropicClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<LLMResponse, LLMError> {
        // System prompts go in a top-level field, not the message list
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == PromptRole::System)
            .map(|m| m.content.as_str())
            .collect();
        let turns: Vec<&ChatMessage> = messages
            .iter()
            .filter(|m| m.role != PromptRole::System)
            .collect();

        let mut request = serde_json::json!({
            "model": self.model,
            "max_tokens": 4096,
            "messages": turns,
            "temperature": params.temperature,
        });
        if !system.is_empty() {
            request["system"] = serde_json::Value::String(system.join("\n"));
        }

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .timeout(params.timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let response_data: serde_json::Value = response.json().await?;

        let content = response_data["content"][0]["text"]
            .as_str()
            .ok_or(LLMError::InvalidResponse("Missing content".to_string()))?
            .to_string();

        let usage_data = &response_data["usage"];
        let prompt_tokens = usage_count(usage_data, "input_tokens");
        let completion_tokens = usage_count(usage_data, "output_tokens");
        let usage = TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        };

        Ok(LLMResponse {
            content,
            usage,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Builds clients for `provider/model` identifiers
pub trait ClientFactory: Send + Sync {
    fn build(&self, model_id: &str) -> Result<Arc<dyn LLMClient>, LLMError>;
}

/// Resolves `openai/`, `anthropic/`, `deepseek/` and `ollama/` model ids
/// against configured credentials.
#[derive(Debug, Clone, Default)]
pub struct ProviderClientFactory {
    settings: LlmSettings,
}

impl ProviderClientFactory {
    pub fn new(settings: LlmSettings) -> Self {
        Self { settings }
    }

    fn api_key(key: &Option<String>, provider: &str) -> Result<String, LLMError> {
        key.clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LLMError::MissingApiKey(provider.to_string()))
    }
}

impl ClientFactory for ProviderClientFactory {
    fn build(&self, model_id: &str) -> Result<Arc<dyn LLMClient>, LLMError> {
        let (provider, model) = model_id
            .split_once('/')
            .filter(|(p, m)| !p.is_empty() && !m.is_empty())
            .ok_or_else(|| LLMError::UnknownProvider(model_id.to_string()))?;
        let model = model.to_string();

        let client: Arc<dyn LLMClient> = match provider {
            "openai" => {
                let key = Self::api_key(&self.settings.openai_api_key, provider)?;
                let base_url = self
                    .settings
                    .openai_base_url
                    .clone()
                    .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
                Arc::new(OpenAIClient::new(key, model).with_base_url(base_url))
            }
            "anthropic" => {
                let key = Self::api_key(&self.settings.anthropic_api_key, provider)?;
                Arc::new(AnthropicClient::new(key, model))
            }
            "deepseek" => {
                let key = Self::api_key(&self.settings.deepseek_api_key, provider)?;
                Arc::new(OpenAIClient::new(key, model).with_base_url(DEEPSEEK_BASE_URL.to_string()))
            }
            "ollama" => {
                let base_url = self
                    .settings
                    .ollama_base_url
                    .clone()
                    .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());
                Arc::new(OpenAIClient::new(String::new(), model).with_base_url(base_url))
            }
            _ => return Err(LLMError::UnknownProvider(model_id.to_string())),
        };

        tracing::debug!(model_id, "Built completion client");
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("Judge the answer."),
            ChatMessage::user("Question: q\n"),
        ]
    }

    #[tokio::test]
    async fn test_openai_complete() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "Judge the answer."},
                    {"role": "user", "content": "Question: q\n"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"content":"{\"score\": 4}"}}],
                    "usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
            )
            .create_async()
            .await;

        let client = OpenAIClient::new("sk-test".to_string(), "gpt-4o-mini".to_string())
            .with_base_url(server.url());
        let response = client
            .complete(&conversation(), &GenerationParams::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, r#"{"score": 4}"#);
        assert_eq!(response.usage.total_tokens, 15);
        assert_eq!(response.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_openai_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let client = OpenAIClient::new("sk-test".to_string(), "gpt-4o-mini".to_string())
            .with_base_url(server.url());
        let err = client
            .complete(&conversation(), &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::RateLimitExceeded));
    }

    #[tokio::test]
    async fn test_anthropic_moves_system_prompt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .match_header("x-api-key", "ak-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "system": "Judge the answer.",
                "messages": [{"role": "user", "content": "Question: q\n"}]
            })))
            .with_status(200)
            .with_body(
                r#"{"content":[{"type":"text","text":"{\"label\": \"Yes\"}"}],
                    "usage":{"input_tokens":7,"output_tokens":3}}"#,
            )
            .create_async()
            .await;

        let client = AnthropicClient::new("ak-test".to_string(), "claude-3-5-haiku".to_string())
            .with_base_url(server.url());
        let response = client
            .complete(&conversation(), &GenerationParams::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, r#"{"label": "Yes"}"#);
        assert_eq!(response.usage.total_tokens, 10);
    }

    #[tokio::test]
    async fn test_missing_content_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let client = OpenAIClient::new(String::new(), "llama3".to_string())
            .with_base_url(server.url());
        let err = client
            .complete(&conversation(), &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::InvalidResponse(_)));
    }

    #[test]
    fn test_factory_resolves_providers() {
        let factory = ProviderClientFactory::new(LlmSettings {
            openai_api_key: Some("sk".to_string()),
            ..LlmSettings::default()
        });

        let client = factory.build("openai/gpt-4o-mini").unwrap();
        assert_eq!(client.model_name(), "gpt-4o-mini");

        let client = factory.build("ollama/llama3").unwrap();
        assert_eq!(client.model_name(), "llama3");
    }

    #[test]
    fn test_factory_errors() {
        let factory = ProviderClientFactory::default();

        assert!(matches!(
            factory.build("anthropic/claude-3-5-haiku"),
            Err(LLMError::MissingApiKey(p)) if p == "anthropic"
        ));
        assert!(matches!(
            factory.build("mystery/model"),
            Err(LLMError::UnknownProvider(_))
        ));
        assert!(matches!(
            factory.build("gpt-4o"),
            Err(LLMError::UnknownProvider(_))
        ));
    }
}
