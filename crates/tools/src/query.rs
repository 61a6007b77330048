//! Query tool — run SQL on the configured data source.
//!
//! The statement is forwarded as-is. Rows come back as an indented JSON
//! array; failures come back as a prefixed message so the model can read
//! the error and try again.

use async_trait::async_trait;
use querybridge_core::database::QueryExecutor;
use querybridge_core::error::{QueryError, ToolError};
use querybridge_core::tool::Tool;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct QueryArgs {
    sql: String,
}

/// Executes the model's SQL through a [`QueryExecutor`].
pub struct QueryTool {
    executor: Arc<dyn QueryExecutor>,
}

impl QueryTool {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        "query"
    }

    fn description(&self) -> &str {
        "Run a SQL query on the database"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "An SQL query to execute on the sqlite database"
                }
            },
            "required": ["sql"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: QueryArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        info!(backend = self.executor.backend(), sql = %args.sql, "Running model query");

        let output = match self.executor.execute(&args.sql).await {
            Ok(result) => {
                debug!(rows = result.len(), "Query returned");
                result
                    .to_json_text()
                    .unwrap_or_else(|e| QueryError::Unexpected(e.to_string()).to_string())
            }
            Err(e) => {
                warn!(error = %e, "Query failed, reporting to model");
                e.to_string()
            }
        };

        Ok(output)
    }
}
