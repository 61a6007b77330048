//! Provider construction from configuration.

use crate::openai_compat::OpenAiCompatProvider;
use crate::openai_responses::{OPENAI_BASE_URL, OpenAiResponsesProvider};
use querybridge_config::{ProviderConfig, ProviderKind};
use querybridge_core::error::ProviderError;
use querybridge_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the configured provider.
pub fn build_from_config(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
    let api_key = config.api_key.clone().unwrap_or_default();
    let timeout = config.timeout_secs.map(Duration::from_secs);

    let provider: Arc<dyn Provider> = match config.kind {
        ProviderKind::Responses => {
            Arc::new(OpenAiResponsesProvider::new(&base_url, api_key, timeout)?)
        }
        ProviderKind::Chat => Arc::new(OpenAiCompatProvider::new(
            provider_name(&base_url),
            &base_url,
            api_key,
            timeout,
        )?),
    };

    info!(provider = provider.name(), base_url = %base_url, model = %config.model, "Provider ready");
    Ok(provider)
}

/// A short label for a chat-completions endpoint, for logs.
fn provider_name(base_url: &str) -> &'static str {
    if base_url.contains("localhost:11434") {
        "ollama"
    } else if base_url.contains("openrouter.ai") {
        "openrouter"
    } else if base_url.contains("api.openai.com") {
        "openai"
    } else {
        "openai-compatible"
    }
}
