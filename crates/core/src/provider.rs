//! Provider trait — the abstraction over completion services.
//!
//! A Provider takes the running conversation, the system instructions, and
//! the tool declarations, and returns the model's output items for one round.
//!
//! Implementations: OpenAI Responses API, OpenAI-compatible chat completions.

use crate::error::ProviderError;
use crate::message::{Message, ToolCallRequest};
use crate::tool::ToolDeclaration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How much hidden reasoning a reasoning model should spend per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// One round's request to the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-5")
    pub model: String,

    /// System instructions sent alongside the history on every round
    pub instructions: String,

    /// The full conversation history so far
    pub input: Vec<Message>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclaration>,

    /// Reasoning effort hint (ignored by non-reasoning backends)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// The service's output for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Output items in the order the service emitted them
    pub output: Vec<Message>,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

impl ProviderResponse {
    /// Concatenated assistant text of this response.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .filter_map(|item| match item {
                Message::Assistant { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool call requests in emission order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallRequest> {
        self.output.iter().filter_map(Message::as_tool_call)
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls().next().is_some()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The conversation loop calls `complete()` once per round without knowing
/// which backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send one round's request and get the complete output.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
