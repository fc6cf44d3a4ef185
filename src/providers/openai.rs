//! OpenAI API provider.
//!
//! This provider uses the OpenAI Chat Completions API for error explanation.
//! The bearer token is read from `OPENAI_API_KEY` on every call unless one
//! was set explicitly.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    get_api_key, get_api_key_env_var, ExplainRequest, ExplanationResult, Provider, ProviderError,
    ProviderType,
};
use crate::config::AssistConfig;
use crate::context::format_for_prompt;

/// Default API base
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Chat completions path, appended to the base URL
const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// System prompt for error explanation
const SYSTEM_PROMPT: &str = r#"You are a debugging assistant for web application developers.
You are given a server error message, the file it was raised in and the
surrounding source code. Explain the most likely cause in a few sentences,
then give concrete steps to fix it. Be concise and practical."#;

/// OpenAI provider
pub struct OpenAIProvider {
    /// HTTP client
    client: Client,
    /// API key; read from the environment per call when unset
    api_key: Option<String>,
    /// API base URL
    base_url: String,
    /// Model to use
    model: String,
    /// Maximum tokens to generate
    max_tokens: u32,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the given request timeout
    pub fn new(model: String, max_tokens: u32, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: None,
            base_url: OPENAI_BASE_URL.to_string(),
            model,
            max_tokens,
        })
    }

    /// Create from the assist section of the config
    pub fn from_config(config: &AssistConfig) -> Result<Self> {
        let provider = Self::new(
            config.model.clone(),
            config.max_tokens,
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(match &config.base_url {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    /// Use a fixed API key instead of the environment
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Point at a different OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH)
    }

    fn api_key(&self) -> Result<String, ProviderError> {
        self.api_key
            .clone()
            .or_else(|| get_api_key(ProviderType::OpenAI))
            .ok_or_else(|| ProviderError::MissingApiKey {
                provider: "OpenAI".to_string(),
                env_var: get_api_key_env_var(ProviderType::OpenAI).to_string(),
            })
    }

    /// Build the request body
    fn build_request(&self, request: &ExplainRequest) -> ChatCompletionRequest {
        let content = format_for_prompt(
            &request.error_message,
            request.file_path.as_deref(),
            &request.source_window,
        );

        ChatCompletionRequest {
            model: self.model.clone(),
            max_tokens: Some(self.max_tokens),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content,
                },
            ],
        }
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn explain(&self, request: &ExplainRequest) -> Result<ExplanationResult> {
        let api_key = self.api_key()?;
        let body = self.build_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                bail!(ProviderError::RateLimited {
                    provider: "OpenAI".to_string()
                });
            }
            bail!(ProviderError::ApiError {
                provider: "OpenAI".to_string(),
                message: format!("HTTP {}: {}", status, error_body),
            });
        }

        let response_body: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        let content = response_body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content)
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: "OpenAI".to_string(),
                message: "response contained no choices".to_string(),
            })?;

        Ok(ExplanationResult {
            raw_response: content,
            provider: ProviderType::OpenAI,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// API types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChatMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Assistant, FALLBACK_MESSAGE};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    fn provider(base_url: &str) -> OpenAIProvider {
        OpenAIProvider::new("gpt-4o-mini".to_string(), 256, Duration::from_secs(5))
            .unwrap()
            .with_api_key("test-key")
            .with_base_url(base_url)
    }

    fn sample_request() -> ExplainRequest {
        ExplainRequest::new(
            "undefined method 'name' for nil",
            Some(Path::new("app/models/user.rb")),
            "def save\n  name.upcase\nend\n",
        )
    }

    #[test]
    fn test_openai_provider_creation() {
        let provider = provider("http://localhost");
        assert_eq!(provider.provider_type(), ProviderType::OpenAI);
        assert_eq!(provider.name(), "OpenAI");
        assert_eq!(provider.model_name(), "gpt-4o-mini");
        assert_eq!(provider.endpoint(), "http://localhost/v1/chat/completions");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = provider("http://localhost:8080/");
        assert_eq!(
            provider.endpoint(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_build_request_messages() {
        let provider = provider("http://localhost");
        let body = provider.build_request(&sample_request());

        assert_eq!(body.model, "gpt-4o-mini");
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[1].role, "user");
        assert!(body.messages[1].content.contains("undefined method 'name'"));
        assert!(body.messages[1].content.contains("app/models/user.rb"));
        assert!(body.messages[1].content.contains("name.upcase"));
    }

    #[tokio::test]
    async fn test_explain_uses_first_choice() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer test-key")
                    .body_includes("gpt-4o-mini");
                then.status(200).json_body(json!({
                    "choices": [
                        {"message": {"role": "assistant", "content": "`name` is nil here."}},
                        {"message": {"role": "assistant", "content": "second"}}
                    ]
                }));
            })
            .await;

        let result = provider(&server.base_url())
            .explain(&sample_request())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.raw_response, "`name` is nil here.");
        assert_eq!(result.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_explain_http_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(500).body("upstream exploded");
            })
            .await;

        let err = provider(&server.base_url())
            .explain(&sample_request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_explain_rate_limited() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(429);
            })
            .await;

        let err = provider(&server.base_url())
            .explain(&sample_request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Rate limited"));
    }

    #[tokio::test]
    async fn test_explain_malformed_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(json!({"unexpected": true}));
            })
            .await;

        let result = provider(&server.base_url())
            .explain(&sample_request())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_explain_empty_choices() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(json!({"choices": []}));
            })
            .await;

        let err = provider(&server.base_url())
            .explain(&sample_request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn test_connection_refused_falls_back() {
        let assistant = Assistant::new(Arc::new(provider("http://127.0.0.1:1")));
        let text = assistant
            .explain(None, "boom", Some(Path::new("app.rb")), "source")
            .await;
        assert_eq!(text, FALLBACK_MESSAGE);
        assert_eq!(text, "Could not fetch AI assistance at this time.");
    }
}
