//! Built-in tool implementations for QueryBridge.
//!
//! The model gets exactly one capability: running SQL against the
//! configured data source through the `query` tool.

pub mod query;

use querybridge_core::database::QueryExecutor;
use querybridge_core::tool::ToolRegistry;
use std::sync::Arc;

pub use query::QueryTool;

/// Create the tool registry the conversation loop offers the model.
pub fn default_registry(executor: Arc<dyn QueryExecutor>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(QueryTool::new(executor)));
    registry
}
