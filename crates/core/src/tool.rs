//! Tool trait — the capabilities the model may invoke.
//!
//! A tool is a typed handler with a uniform signature: JSON arguments in,
//! result string out. Adding a tool means registering one more handler;
//! the dispatch path never changes.

use crate::error::ToolError;
use crate::message::{ToolCallRequest, ToolCallResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Tool output for a request naming a tool nobody registered.
pub const UNKNOWN_FUNCTION: &str = "unknown function";

/// A tool declaration sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "query").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a declaration for the model.
    fn to_declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// An ordered registry of available tools.
///
/// The conversation loop uses this to:
/// 1. Get tool declarations to send to the model, in registration order
/// 2. Dispatch the model's tool calls by name
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// All tool declarations, in registration order.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.iter().map(|t| t.to_declaration()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Execute one tool call and produce its correlated result.
    ///
    /// Never fails: unknown tools, malformed arguments, and handler errors
    /// all become output strings the model can react to.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> ToolCallResult {
        let output = match self.run(call).await {
            Ok(output) => output,
            Err(ToolError::NotFound(name)) => {
                warn!(tool = %name, call_id = %call.call_id, "Model requested an unknown tool");
                UNKNOWN_FUNCTION.to_string()
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.call_id, error = %e, "Tool call failed");
                format!("Error: {e}")
            }
        };

        ToolCallResult {
            call_id: call.call_id.clone(),
            output,
        }
    }

    async fn run(&self, call: &ToolCallRequest) -> std::result::Result<String, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let arguments: serde_json::Value = serde_json::from_str(&call.arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))?;
        validate_arguments(&tool.parameters_schema(), &arguments)?;

        debug!(tool = %call.name, call_id = %call.call_id, "Dispatching tool call");
        tool.execute(arguments).await
    }
}

/// Check arguments against the object schema a tool declared.
///
/// Covers what declarations here use: the top level must be an object,
/// every `required` key must be present, and properties with a primitive
/// `type` must match it.
pub fn validate_arguments(
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> std::result::Result<(), ToolError> {
    let Some(object) = arguments.as_object() else {
        return Err(ToolError::InvalidArguments(
            "arguments must be a JSON object".into(),
        ));
    };

    if let Some(required) = schema["required"].as_array() {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !object.contains_key(key) {
                return Err(ToolError::InvalidArguments(format!(
                    "missing required parameter '{key}'"
                )));
            }
        }
    }

    if let Some(properties) = schema["properties"].as_object() {
        for (key, value) in object {
            let Some(expected) = properties.get(key).and_then(|p| p["type"].as_str()) else {
                continue;
            };
            let matches = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                "null" => value.is_null(),
                _ => true,
            };
            if !matches {
                return Err(ToolError::InvalidArguments(format!(
                    "parameter '{key}' must be of type {expected}"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A simple test tool that echoes its `text` argument.
    struct EchoTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<String, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(arguments["text"].as_str().unwrap_or("").to_string())
        }
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "named"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> std::result::Result<String, ToolError> {
            Ok(self.0.to_string())
        }
    }

    fn echo_registry() -> (ToolRegistry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool {
            calls: calls.clone(),
        }));
        (registry, calls)
    }

    #[test]
    fn declarations_follow_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(NamedTool("zeta")));
        registry.register(Box::new(NamedTool("alpha")));
        registry.register(Box::new(NamedTool("mid")));
        let names: Vec<_> = registry.declarations().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn register_replaces_same_name_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(NamedTool("a")));
        registry.register(Box::new(NamedTool("b")));
        registry.register(Box::new(NamedTool("a")));
        assert_eq!(registry.names(), ["a", "b"]);
    }

    #[tokio::test]
    async fn dispatch_correlates_call_id() {
        let (registry, calls) = echo_registry();
        let call = ToolCallRequest::new("call_7", "echo", r#"{"text":"hello world"}"#);
        let result = registry.dispatch(&call).await;
        assert_eq!(result.call_id, "call_7");
        assert_eq!(result.output, "hello world");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_tool_yields_fixed_output() {
        let (registry, calls) = echo_registry();
        let call = ToolCallRequest::new("call_1", "delete_everything", "{}");
        let result = registry.dispatch(&call).await;
        assert_eq!(result.output, UNKNOWN_FUNCTION);
        assert_eq!(result.call_id, "call_1");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_reported_not_executed() {
        let (registry, calls) = echo_registry();
        let call = ToolCallRequest::new("call_1", "echo", "{not json");
        let result = registry.dispatch(&call).await;
        assert!(result.output.starts_with("Error: Invalid tool arguments"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn schema_validation_rules() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": { "sql": { "type": "string" } },
            "required": ["sql"]
        });
        assert!(validate_arguments(&schema, &serde_json::json!({"sql": "SELECT 1"})).is_ok());
        assert!(validate_arguments(&schema, &serde_json::json!({})).is_err());
        assert!(validate_arguments(&schema, &serde_json::json!({"sql": 5})).is_err());
        assert!(validate_arguments(&schema, &serde_json::json!(["SELECT 1"])).is_err());
        // Unknown extra keys are tolerated.
        assert!(
            validate_arguments(&schema, &serde_json::json!({"sql": "x", "note": 1})).is_ok()
        );
    }
}
