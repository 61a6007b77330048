//! # QueryBridge Core
//!
//! Domain types, traits, and error definitions for QueryBridge, a chat bot
//! that answers questions by letting an LLM run SQL against a database.
//!
//! Every external collaborator (completion service, data source, chat
//! platform) is defined as a trait here. Implementations live in their
//! respective crates, which keeps the conversation loop testable with
//! scripted providers and counting executors.

pub mod channel;
pub mod database;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelId, ChannelMessage};
pub use database::{QueryExecutor, QueryResult, Row};
pub use error::{Error, QueryError};
pub use message::{Conversation, ConversationId, Message, Role, ToolCallRequest, ToolCallResult};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use tool::{Tool, ToolDeclaration, ToolRegistry, UNKNOWN_FUNCTION};
