//! SQLite executor.
//!
//! Values are decoded by their runtime storage class rather than the declared
//! column type, so expressions like `COUNT(*)` and untyped columns come back
//! as proper JSON numbers. BLOBs are rendered as base64 strings.

use crate::{map_sqlx_error, with_deadline};
use async_trait::async_trait;
use base64::Engine as _;
use querybridge_core::database::{QueryExecutor, QueryResult};
use querybridge_core::error::QueryError;
use serde_json::{Value, json};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Runs arbitrary SQL against a SQLite database file.
///
/// Every statement commits as soon as it completes. With the default pool
/// size of one, statements from concurrent conversations run one at a time.
pub struct SqliteExecutor {
    pool: SqlitePool,
    query_timeout: Option<Duration>,
}

impl SqliteExecutor {
    /// Open (creating if missing) the database at `url`.
    ///
    /// Accepts `sqlite://path`, `sqlite:path`, or `sqlite::memory:`. An
    /// in-memory database is private to its connection, so keep
    /// `max_connections` at 1 for those.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, QueryError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| QueryError::Unexpected(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| QueryError::Unexpected(format!("Failed to open SQLite: {e}")))?;

        info!(url, max_connections, "SQLite executor ready");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool (useful for testing).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            query_timeout: None,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    async fn fetch(&self, sql: &str) -> Result<QueryResult, QueryError> {
        let rows = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let Some(first) = rows.first() else {
            return Ok(QueryResult::empty());
        };

        let columns: Vec<String> = first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let values = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryResult::from_columns(&columns, values))
    }
}

/// Decode one row positionally by each value's storage class.
fn decode_row(row: &SqliteRow) -> Result<Vec<Value>, QueryError> {
    (0..row.len())
        .map(|i| {
            let raw = row.try_get_raw(i).map_err(map_sqlx_error)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let storage = raw.type_info().name().to_string();

            let value = match storage.as_str() {
                "INTEGER" => json!(row.try_get::<i64, _>(i).map_err(map_sqlx_error)?),
                "REAL" => json!(row.try_get::<f64, _>(i).map_err(map_sqlx_error)?),
                "BLOB" => {
                    let bytes = row.try_get::<Vec<u8>, _>(i).map_err(map_sqlx_error)?;
                    json!(base64::engine::general_purpose::STANDARD.encode(bytes))
                }
                _ => Value::String(row.try_get::<String, _>(i).map_err(map_sqlx_error)?),
            };
            Ok(value)
        })
        .collect()
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, QueryError> {
        debug!(sql, "Executing SQLite query");
        let result = with_deadline(self.query_timeout, self.fetch(sql)).await;
        match &result {
            Ok(rows) => debug!(rows = rows.len(), "SQLite query complete"),
            Err(e) => debug!(error = %e, "SQLite query failed"),
        }
        result
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
