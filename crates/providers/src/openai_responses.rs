//! OpenAI Responses API provider.
//!
//! Each round posts the full input history to `{base_url}/responses` along
//! with the instructions and tool declarations. Output items the loop does
//! not interpret (reasoning, for one) are kept verbatim and replayed on the
//! next round, which reasoning models require next to their function calls.

use crate::http::{build_client, models_reachable, post_json};
use async_trait::async_trait;
use querybridge_core::error::ProviderError;
use querybridge_core::message::{Message, ToolCallRequest};
use querybridge_core::provider::*;
use querybridge_core::tool::ToolDeclaration;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, trace};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// A provider speaking the OpenAI Responses API.
pub struct OpenAiResponsesProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiResponsesProvider {
    /// Create a provider. `timeout` bounds each HTTP request; `None` waits.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: build_client(timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the request body for one round.
    fn to_api_body(request: &ProviderRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "instructions": request.instructions,
            "input": Self::to_api_input(&request.input),
        });

        if !request.tools.is_empty() {
            body["tools"] = json!(Self::to_api_tools(&request.tools));
        }
        if let Some(effort) = request.reasoning_effort {
            body["reasoning"] = json!({ "effort": effort.as_str() });
        }
        if let Some(max) = request.max_output_tokens {
            body["max_output_tokens"] = json!(max);
        }

        body
    }

    /// Convert conversation messages to Responses API input items.
    fn to_api_input(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| match m {
                Message::User { content } => json!({ "role": "user", "content": content }),
                Message::Assistant {
                    item: Some(item), ..
                } => item.clone(),
                Message::Assistant { content, item: None } => {
                    json!({ "role": "assistant", "content": content })
                }
                Message::ToolCall(call) => {
                    let mut item = json!({
                        "type": "function_call",
                        "call_id": call.call_id,
                        "name": call.name,
                        "arguments": call.arguments,
                    });
                    if let Some(id) = &call.item_id {
                        item["id"] = json!(id);
                    }
                    item
                }
                Message::ToolResult(result) => json!({
                    "type": "function_call_output",
                    "call_id": result.call_id,
                    "output": result.output,
                }),
                Message::Passthrough(item) => item.clone(),
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDeclaration]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect()
    }

    /// Parse a Responses API body into ordered output messages.
    fn parse_response(body: Value) -> Result<ProviderResponse, ProviderError> {
        if let Some(message) = body["error"]["message"].as_str() {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: message.to_string(),
            });
        }

        let api: ApiResponse = serde_json::from_value(body).map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        let mut output = Vec::with_capacity(api.output.len());
        for item in api.output {
            output.push(Self::parse_item(item)?);
        }

        Ok(ProviderResponse {
            output,
            usage: api.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                total_tokens: u.total_tokens,
            }),
            model: api.model,
        })
    }

    fn parse_item(item: Value) -> Result<Message, ProviderError> {
        let malformed = |e: serde_json::Error| ProviderError::ApiError {
            status_code: 200,
            message: format!("Malformed output item: {e}"),
        };

        match item["type"].as_str() {
            Some("message") => {
                let message: ApiMessageItem =
                    serde_json::from_value(item.clone()).map_err(malformed)?;
                let content: String = message
                    .content
                    .into_iter()
                    .filter_map(|part| part.text.or(part.refusal))
                    .collect();
                Ok(Message::Assistant {
                    content,
                    item: Some(item),
                })
            }
            Some("function_call") => {
                let call: ApiFunctionCall = serde_json::from_value(item).map_err(malformed)?;
                Ok(Message::ToolCall(ToolCallRequest {
                    call_id: call.call_id,
                    name: call.name,
                    arguments: call.arguments,
                    item_id: call.id,
                }))
            }
            _ => Ok(Message::Passthrough(item)),
        }
    }
}

#[async_trait]
impl querybridge_core::Provider for OpenAiResponsesProvider {
    fn name(&self) -> &str {
        "openai-responses"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/responses", self.base_url);
        let body = Self::to_api_body(&request);

        debug!(
            model = %request.model,
            items = request.input.len(),
            tools = request.tools.len(),
            "Sending responses request"
        );
        trace!(body = %body, "Responses request body");

        let response = post_json(&self.client, &url, &self.api_key, &body).await?;
        let parsed = Self::parse_response(response)?;

        debug!(
            model = %parsed.model,
            items = parsed.output.len(),
            tool_calls = parsed.tool_calls().count(),
            "Received responses output"
        );
        Ok(parsed)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        models_reachable(&self.client, &self.base_url, &self.api_key).await
    }
}

// --- OpenAI Responses API types ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    output: Vec<Value>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiMessageItem {
    #[serde(default)]
    content: Vec<ApiContentPart>,
}

#[derive(Debug, Deserialize)]
struct ApiContentPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    #[serde(default)]
    id: Option<String>,
    call_id: String,
    name: String,
    #[serde(default)]
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use querybridge_core::Provider;

    fn request(input: Vec<Message>) -> ProviderRequest {
        ProviderRequest {
            model: "gpt-5".into(),
            instructions: "You answer questions about a DVD rental store.".into(),
            input,
            tools: vec![ToolDeclaration {
                name: "query".into(),
                description: "Run a SQL query on the database".into(),
                parameters: json!({"type": "object", "properties": {"sql": {"type": "string"}}}),
            }],
            reasoning_effort: Some(ReasoningEffort::Low),
            max_output_tokens: None,
        }
    }

    #[test]
    fn base_url_is_normalized() {
        let provider = OpenAiResponsesProvider::new("https://api.openai.com/v1/", "sk-test", None).unwrap();
        assert_eq!(provider.base_url(), "https://api.openai.com/v1");
        assert_eq!(provider.name(), "openai-responses");
    }

    #[test]
    fn body_carries_instructions_tools_and_effort() {
        let body = OpenAiResponsesProvider::to_api_body(&request(vec![Message::user(
            "How many films are there?",
        )]));
        assert_eq!(body["model"], "gpt-5");
        assert_eq!(body["instructions"], "You answer questions about a DVD rental store.");
        assert_eq!(body["reasoning"]["effort"], "low");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["name"], "query");
        assert_eq!(body["input"][0], json!({"role": "user", "content": "How many films are there?"}));
        assert!(body.get("max_output_tokens").is_none());
    }

    #[test]
    fn body_without_effort_has_no_reasoning() {
        let mut req = request(vec![Message::user("hi")]);
        req.reasoning_effort = None;
        let body = OpenAiResponsesProvider::to_api_body(&req);
        assert!(body.get("reasoning").is_none());
    }

    #[test]
    fn history_items_round_trip_to_wire_shape() {
        let reasoning = json!({"type": "reasoning", "id": "rs_1", "summary": []});
        let mut call = ToolCallRequest::new("call_1", "query", r#"{"sql":"SELECT 1"}"#);
        call.item_id = Some("fc_1".into());

        let input = OpenAiResponsesProvider::to_api_input(&[
            Message::user("q"),
            Message::Passthrough(reasoning.clone()),
            Message::ToolCall(call),
            Message::tool_result("call_1", "[]"),
        ]);

        assert_eq!(input[1], reasoning);
        assert_eq!(
            input[2],
            json!({
                "type": "function_call",
                "call_id": "call_1",
                "name": "query",
                "arguments": "{\"sql\":\"SELECT 1\"}",
                "id": "fc_1"
            })
        );
        assert_eq!(
            input[3],
            json!({"type": "function_call_output", "call_id": "call_1", "output": "[]"})
        );
    }

    #[test]
    fn parses_tool_call_round() {
        let body = json!({
            "id": "resp_1",
            "model": "gpt-5-2025-08-07",
            "status": "completed",
            "error": null,
            "output": [
                {"type": "reasoning", "id": "rs_1", "summary": []},
                {
                    "type": "function_call",
                    "id": "fc_1",
                    "call_id": "call_abc",
                    "name": "query",
                    "arguments": "{\"sql\":\"SELECT COUNT(*) FROM film\"}",
                    "status": "completed"
                }
            ],
            "usage": {"input_tokens": 900, "output_tokens": 40, "total_tokens": 940}
        });

        let resp = OpenAiResponsesProvider::parse_response(body).unwrap();
        assert_eq!(resp.model, "gpt-5-2025-08-07");
        assert_eq!(resp.output.len(), 2);
        assert!(matches!(resp.output[0], Message::Passthrough(_)));
        let call = resp.tool_calls().next().unwrap();
        assert_eq!(call.call_id, "call_abc");
        assert_eq!(call.item_id.as_deref(), Some("fc_1"));
        assert_eq!(resp.usage.unwrap().total_tokens, 940);
    }

    #[test]
    fn parses_text_round() {
        let body = json!({
            "model": "gpt-5",
            "output": [{
                "type": "message",
                "id": "msg_1",
                "role": "assistant",
                "content": [
                    {"type": "output_text", "text": "There are 1000 films.", "annotations": []}
                ]
            }]
        });
        let resp = OpenAiResponsesProvider::parse_response(body).unwrap();
        assert!(!resp.has_tool_calls());
        assert_eq!(resp.output_text(), "There are 1000 films.");
        assert!(resp.usage.is_none());
    }

    #[test]
    fn message_items_are_replayed_unchanged() {
        let reasoning = json!({"type": "reasoning", "id": "rs_1", "summary": []});
        let message = json!({
            "type": "message",
            "id": "msg_1",
            "status": "completed",
            "role": "assistant",
            "content": [
                {"type": "output_text", "text": "Let me check.", "annotations": []}
            ]
        });
        let call = json!({
            "type": "function_call",
            "id": "fc_1",
            "call_id": "call_1",
            "name": "query",
            "arguments": "{\"sql\":\"SELECT COUNT(*) FROM film\"}",
            "status": "completed"
        });
        let body = json!({
            "model": "gpt-5",
            "output": [reasoning.clone(), message.clone(), call]
        });

        let resp = OpenAiResponsesProvider::parse_response(body).unwrap();
        assert_eq!(resp.output_text(), "Let me check.");
        assert_eq!(resp.output[1].text(), Some("Let me check."));

        let replay = OpenAiResponsesProvider::to_api_input(&resp.output);
        assert_eq!(replay[0], reasoning);
        assert_eq!(replay[1], message);
        assert_eq!(replay[2]["id"], "fc_1");
    }

    #[test]
    fn assistant_text_without_item_uses_role_shape() {
        let input = OpenAiResponsesProvider::to_api_input(&[Message::assistant("Done.")]);
        assert_eq!(input[0], json!({"role": "assistant", "content": "Done."}));
    }

    #[test]
    fn error_body_becomes_api_error() {
        let body = json!({"error": {"message": "Reasoning item missing", "code": "invalid"}, "output": []});
        let err = OpenAiResponsesProvider::parse_response(body).unwrap_err();
        assert!(err.to_string().contains("Reasoning item missing"));
    }

    #[test]
    fn malformed_function_call_is_rejected() {
        let body = json!({"model": "gpt-5", "output": [{"type": "function_call", "name": "query"}]});
        assert!(OpenAiResponsesProvider::parse_response(body).is_err());
    }
}
