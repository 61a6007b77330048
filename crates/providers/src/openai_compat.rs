//! OpenAI-compatible chat completions provider.
//!
//! Works with any endpoint exposing `/v1/chat/completions` with function
//! calling: Ollama, vLLM, llama.cpp, OpenRouter, and OpenAI itself.
//!
//! Chat completions has no notion of opaque output items, so passthrough
//! history is dropped and consecutive tool calls are folded into one
//! assistant message. Reasoning effort is not sent; most local servers reject it.

use crate::http::{build_client, models_reachable, post_json};
use async_trait::async_trait;
use querybridge_core::error::ProviderError;
use querybridge_core::message::{Message, ToolCallRequest};
use querybridge_core::provider::*;
use querybridge_core::tool::ToolDeclaration;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// An OpenAI-compatible chat completions provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: build_client(timeout)?,
        })
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            None,
        )
    }

    /// Convert the instructions and history to chat messages.
    fn to_api_messages(instructions: &str, messages: &[Message]) -> Vec<ApiMessage> {
        let mut out = vec![ApiMessage::text("system", instructions)];

        for m in messages {
            match m {
                Message::User { content } => out.push(ApiMessage::text("user", content)),
                Message::Assistant { content, .. } => out.push(ApiMessage::text("assistant", content)),
                Message::ToolCall(call) => {
                    let api_call = ApiToolCall {
                        id: call.call_id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    };
                    match out.last_mut() {
                        Some(last) if last.role == "assistant" => {
                            last.tool_calls.get_or_insert_with(Vec::new).push(api_call);
                        }
                        _ => out.push(ApiMessage {
                            role: "assistant".into(),
                            content: None,
                            tool_calls: Some(vec![api_call]),
                            tool_call_id: None,
                        }),
                    }
                }
                Message::ToolResult(result) => out.push(ApiMessage {
                    role: "tool".into(),
                    content: Some(result.output.clone()),
                    tool_calls: None,
                    tool_call_id: Some(result.call_id.clone()),
                }),
                Message::Passthrough(_) => {}
            }
        }

        out
    }

    /// Convert tool declarations to OpenAI API format.
    fn to_api_tools(tools: &[ToolDeclaration]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn parse_response(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let mut output = Vec::new();
        if let Some(content) = choice.message.content.filter(|c| !c.is_empty()) {
            output.push(Message::assistant(content));
        }
        output.extend(
            choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| {
                    Message::ToolCall(ToolCallRequest::new(
                        tc.id,
                        tc.function.name,
                        tc.function.arguments,
                    ))
                }),
        );

        Ok(ProviderResponse {
            output,
            usage: api_response.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: api_response.model,
        })
    }
}

#[async_trait]
impl querybridge_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.instructions, &request.input),
            "stream": false,
        });

        if let Some(max_tokens) = request.max_output_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = post_json(&self.client, &url, &self.api_key, &body).await?;
        let api_response: ApiResponse =
            serde_json::from_value(response).map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        Self::parse_response(api_response)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        models_reachable(&self.client, &self.base_url, &self.api_key).await
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    model: String,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
