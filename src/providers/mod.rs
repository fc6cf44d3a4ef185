//! Completion providers for error explanation.
//!
//! This module provides a unified interface for the providers that can
//! explain a server error: the remote chat-completion API and a fixed notice
//! used when remote assistance is switched off. [`Assistant`] wraps a
//! provider and never fails; any provider error degrades to
//! [`FALLBACK_MESSAGE`].

pub mod fixed;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AssistConfig;
use crate::context::error_summary;

/// Returned by [`Assistant::explain`] when the provider fails
pub const FALLBACK_MESSAGE: &str = "Could not fetch AI assistance at this time.";

/// Available providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// OpenAI-compatible chat completions API
    #[default]
    OpenAI,
    /// Static notice, no network access
    Fixed,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::OpenAI => write!(f, "openai"),
            ProviderType::Fixed => write!(f, "fixed"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            "fixed" => Ok(ProviderType::Fixed),
            _ => Err(format!(
                "Unknown provider: {}. Valid options: openai, fixed",
                s
            )),
        }
    }
}

/// Everything a provider needs to explain one error
#[derive(Debug, Clone, Default)]
pub struct ExplainRequest {
    /// Exception class or error type, if known
    pub kind: Option<String>,
    /// Exception message
    pub error_message: String,
    /// File the innermost frame points at, if known
    pub file_path: Option<PathBuf>,
    /// Source lines around the failing line
    pub source_window: String,
}

impl ExplainRequest {
    pub fn new(
        error_message: impl Into<String>,
        file_path: Option<&Path>,
        source_window: impl Into<String>,
    ) -> Self {
        Self {
            kind: None,
            error_message: error_message.into(),
            file_path: file_path.map(Path::to_path_buf),
            source_window: source_window.into(),
        }
    }

    /// Builder: set the exception kind
    pub fn with_kind(mut self, kind: Option<&str>) -> Self {
        self.kind = kind.map(str::to_string);
        self
    }

    /// One-line description of the error, with the kind when present
    pub fn summary(&self) -> String {
        error_summary(self.kind.as_deref(), &self.error_message)
    }
}

/// Result of an explanation request
#[derive(Debug, Clone)]
pub struct ExplanationResult {
    /// Text returned by the provider
    pub raw_response: String,
    /// Provider that generated the response
    pub provider: ProviderType,
    /// Model used for generation
    pub model: String,
}

/// Provider trait for error explanation
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> ProviderType;

    /// Get the provider name for display
    fn name(&self) -> &'static str;

    /// Explain one error
    async fn explain(&self, request: &ExplainRequest) -> Result<ExplanationResult>;

    /// Get the current model name/identifier
    fn model_name(&self) -> &str;
}

/// Error types for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API key not configured for {provider}. Set {env_var} environment variable.")]
    MissingApiKey { provider: String, env_var: String },

    #[error("API error from {provider}: {message}")]
    ApiError { provider: String, message: String },

    #[error("Rate limited by {provider}. Please wait and try again.")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },
}

/// Get the environment variable holding a provider's API key
pub fn get_api_key_env_var(provider: ProviderType) -> &'static str {
    match provider {
        ProviderType::OpenAI => "OPENAI_API_KEY",
        ProviderType::Fixed => "",
    }
}

/// Get API key from environment for a provider
pub fn get_api_key(provider: ProviderType) -> Option<String> {
    let env_var = get_api_key_env_var(provider);
    if env_var.is_empty() {
        return None;
    }
    std::env::var(env_var).ok().filter(|s| !s.is_empty())
}

/// Never-failing front end over a [`Provider`]
#[derive(Clone)]
pub struct Assistant {
    provider: Arc<dyn Provider>,
}

impl Assistant {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Build the provider selected by `config`.
    ///
    /// Remote assistance that is disabled selects the fixed notice.
    pub fn from_config(config: &AssistConfig) -> Result<Self> {
        let provider: Arc<dyn Provider> = match (config.enabled, config.provider) {
            (true, ProviderType::OpenAI) => Arc::new(openai::OpenAIProvider::from_config(config)?),
            _ => Arc::new(fixed::FixedProvider),
        };
        tracing::debug!(
            provider = %provider.provider_type(),
            model = provider.model_name(),
            "selected assistance provider"
        );
        Ok(Self::new(provider))
    }

    /// Name of the wrapped provider
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Ask the provider to explain an error.
    ///
    /// Returns [`FALLBACK_MESSAGE`] on any provider failure.
    pub async fn explain(
        &self,
        kind: Option<&str>,
        error_message: &str,
        file_path: Option<&Path>,
        source_window: &str,
    ) -> String {
        let request =
            ExplainRequest::new(error_message, file_path, source_window).with_kind(kind);

        match self.provider.explain(&request).await {
            Ok(result) => {
                tracing::debug!(
                    provider = %result.provider,
                    model = %result.model,
                    chars = result.raw_response.len(),
                    "received explanation"
                );
                result.raw_response
            }
            Err(err) => {
                tracing::warn!(provider = self.provider.name(), "AI assistance failed: {:#}", err);
                FALLBACK_MESSAGE.to_string()
            }
        }
    }
}

impl fmt::Debug for Assistant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assistant")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model_name())
            .finish()
    }
}
