//! QueryExecutor trait — the abstraction over the relational data source.
//!
//! An executor runs arbitrary SQL text and renders the rows as ordered
//! column-name → value maps. It performs no validation of its own; policy
//! layers wrap it instead of changing it.

use crate::error::QueryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One result row: column name → scalar, in the data source's column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// An ordered sequence of rows sharing one column set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryResult {
    rows: Vec<Row>,
}

impl QueryResult {
    /// The result of a statement that returns no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a result from column names and positional row values.
    ///
    /// Every row gets exactly the given columns, so all rows share one key set.
    /// Missing trailing values become `null`; extra values are dropped.
    pub fn from_columns(columns: &[String], rows: Vec<Vec<serde_json::Value>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|values| {
                let mut values = values.into_iter();
                columns
                    .iter()
                    .map(|column| {
                        (
                            column.clone(),
                            values.next().unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect::<Row>()
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in order, taken from the first row.
    pub fn columns(&self) -> Vec<&str> {
        self.rows
            .first()
            .map(|row| row.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Render as the indented JSON array handed to the model.
    pub fn to_json_text(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.rows)
    }
}

/// The core QueryExecutor trait.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Backend name for logs and diagnostics (e.g., "sqlite").
    fn backend(&self) -> &str;

    /// Run one query string, committing immediately if it mutates state.
    async fn execute(&self, sql: &str) -> std::result::Result<QueryResult, QueryError>;

    /// Health check — is the data source reachable?
    async fn health_check(&self) -> std::result::Result<bool, QueryError> {
        self.execute("SELECT 1").await.map(|_| true)
    }

    /// Release the underlying connections.
    async fn close(&self) {}
}
