//! Static notice provider.
//!
//! Used when remote assistance is disabled. It answers every request with
//! the error summary and a generic suggestion, without network access.

use anyhow::Result;
use async_trait::async_trait;

use super::{ExplainRequest, ExplanationResult, Provider, ProviderType};

/// Generic advice shown instead of a model response
pub const STATIC_SUGGESTION: &str = "AI Suggestion: Try checking the error details above and ensure your code aligns with your framework's conventions. For more help, consult the framework documentation or debugging tools.";

/// Fixed notice provider
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedProvider;

#[async_trait]
impl Provider for FixedProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Fixed
    }

    fn name(&self) -> &'static str {
        "Fixed notice"
    }

    async fn explain(&self, request: &ExplainRequest) -> Result<ExplanationResult> {
        Ok(ExplanationResult {
            raw_response: format!("{}\n\n{}", request.summary(), STATIC_SUGGESTION),
            provider: ProviderType::Fixed,
            model: "none".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "none"
    }
}
