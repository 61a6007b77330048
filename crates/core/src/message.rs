//! Message and Conversation domain types.
//!
//! These are the value objects that flow through one question's lifetime:
//! the user's question seeds a conversation, the provider appends its output
//! items, and every tool call gets a correlated tool result.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (one `run` invocation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who a history item is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// The person asking the question
    User,
    /// The model (text, tool call requests, opaque output items)
    Assistant,
    /// Output of a tool executed on the model's behalf
    ToolResult,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque id correlating this request with its result
    pub call_id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON-encoded string, exactly as the model produced them
    pub arguments: String,

    /// Provider-side id of the output item, when the wire format has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

impl ToolCallRequest {
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
            item_id: None,
        }
    }
}

/// The output of a tool, correlated back to its request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Copied from [`ToolCallRequest::call_id`]
    pub call_id: String,

    /// Serialized result or an error description
    pub output: String,
}

/// One item of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Message {
    /// Text from the user
    User { content: String },

    /// Text produced by the model. `item` holds the provider's own output
    /// item when there is one, so it can be replayed unchanged.
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item: Option<serde_json::Value>,
    },

    /// A tool call the model requested
    ToolCall(ToolCallRequest),

    /// The result fed back for a tool call
    ToolResult(ToolCallResult),

    /// A provider output item with no domain meaning (e.g. reasoning state)
    /// that must be replayed verbatim on the next request.
    Passthrough(serde_json::Value),
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create a new assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            item: None,
        }
    }

    /// Create a tool result message.
    pub fn tool_result(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ToolResult(ToolCallResult {
            call_id: call_id.into(),
            output: output.into(),
        })
    }

    pub fn role(&self) -> Role {
        match self {
            Self::User { .. } => Role::User,
            Self::Assistant { .. } | Self::ToolCall(_) | Self::Passthrough(_) => Role::Assistant,
            Self::ToolResult(_) => Role::ToolResult,
        }
    }

    /// The tool call carried by this item, if it is one.
    pub fn as_tool_call(&self) -> Option<&ToolCallRequest> {
        match self {
            Self::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    /// The plain text of a user or assistant message.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::User { content } | Self::Assistant { content, .. } => Some(content),
            _ => None,
        }
    }
}

/// An append-only, ordered history of one question's exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
        }
    }

    /// Start a conversation with the user's question.
    pub fn with_question(question: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.push(Message::user(question));
        conversation
    }

    /// Append a message to the end of the history.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append several messages, preserving their order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All tool results in history order.
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolCallResult> {
        self.messages.iter().filter_map(|m| match m {
            Message::ToolResult(result) => Some(result),
            _ => None,
        })
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
