//! PostgreSQL executor.
//!
//! Postgres values carry a declared type per column, so decoding dispatches
//! on the type name the way a SQL client browser does.

use crate::{map_sqlx_error, with_deadline};
use async_trait::async_trait;
use base64::Engine as _;
use querybridge_core::database::{QueryExecutor, QueryResult};
use querybridge_core::error::QueryError;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, PgTypeKind};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::{debug, info};

/// Runs arbitrary SQL against a PostgreSQL database.
pub struct PostgresExecutor {
    pool: PgPool,
    query_timeout: Option<Duration>,
}

impl PostgresExecutor {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await
            .map_err(|e| QueryError::Unexpected(format!("Failed to connect to PostgreSQL: {e}")))?;

        info!(url = %crate::redact_url(url), max_connections, "PostgreSQL executor ready");
        Ok(Self {
            pool,
            query_timeout: None,
        })
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

/// How a column's values become JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoder {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Uuid,
    Date,
    Time,
    Timestamp,
    Timestamptz,
    Json,
    Bytea,
    TextArray,
    Int4Array,
    Int8Array,
    /// User-defined enums travel as their label.
    Label,
}

/// Pick the decoder for a column type.
///
/// Covers the scalar types, one-dimensional text and integer arrays, and
/// enums. Anything else (intervals, ranges, geometric and full-text types)
/// has no decoder and must be cast to text in the query.
fn decoder_for(type_name: &str, is_enum: bool) -> Option<Decoder> {
    let decoder = match type_name {
        "BOOL" => Decoder::Bool,
        "INT2" => Decoder::Int2,
        "INT4" => Decoder::Int4,
        "INT8" => Decoder::Int8,
        "FLOAT4" => Decoder::Float4,
        "FLOAT8" => Decoder::Float8,
        "NUMERIC" => Decoder::Numeric,
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => Decoder::Text,
        "UUID" => Decoder::Uuid,
        "DATE" => Decoder::Date,
        "TIME" => Decoder::Time,
        "TIMESTAMP" => Decoder::Timestamp,
        "TIMESTAMPTZ" => Decoder::Timestamptz,
        "JSON" | "JSONB" => Decoder::Json,
        "BYTEA" => Decoder::Bytea,
        "TEXT[]" | "VARCHAR[]" => Decoder::TextArray,
        "INT4[]" => Decoder::Int4Array,
        "INT8[]" => Decoder::Int8Array,
        _ if is_enum => Decoder::Label,
        _ => return None,
    };
    Some(decoder)
}

fn unsupported(column: &str, type_name: &str) -> QueryError {
    QueryError::Unexpected(format!(
        "column '{column}' has unsupported type {type_name}; cast it to text (e.g. {column}::text)"
    ))
}

fn decode_row(row: &PgRow) -> Result<Vec<Value>, QueryError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let raw = row.try_get_raw(i).map_err(map_sqlx_error)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let type_info = col.type_info();
            let is_enum = matches!(type_info.kind(), PgTypeKind::Enum(_));
            let decoder = decoder_for(type_info.name(), is_enum)
                .ok_or_else(|| unsupported(col.name(), type_info.name()))?;
            decode_value(row, i, decoder).map_err(map_sqlx_error)
        })
        .collect()
}

fn decode_value(row: &PgRow, i: usize, decoder: Decoder) -> Result<Value, sqlx::Error> {
    let value = match decoder {
        Decoder::Bool => json!(row.try_get::<bool, _>(i)?),
        Decoder::Int2 => json!(row.try_get::<i16, _>(i)?),
        Decoder::Int4 => json!(row.try_get::<i32, _>(i)?),
        Decoder::Int8 => json!(row.try_get::<i64, _>(i)?),
        Decoder::Float4 => json!(row.try_get::<f32, _>(i)?),
        Decoder::Float8 => json!(row.try_get::<f64, _>(i)?),
        Decoder::Numeric => {
            let v = row.try_get::<rust_decimal::Decimal, _>(i)?;
            v.to_f64().map_or_else(|| json!(v.to_string()), |f| json!(f))
        }
        Decoder::Text => Value::String(row.try_get::<String, _>(i)?),
        Decoder::Uuid => json!(row.try_get::<uuid::Uuid, _>(i)?.to_string()),
        Decoder::Date => json!(row.try_get::<chrono::NaiveDate, _>(i)?.format("%Y-%m-%d").to_string()),
        Decoder::Time => json!(row.try_get::<chrono::NaiveTime, _>(i)?.format("%H:%M:%S").to_string()),
        Decoder::Timestamp => json!(
            row.try_get::<chrono::NaiveDateTime, _>(i)?
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string()
        ),
        Decoder::Timestamptz => json!(row.try_get::<chrono::DateTime<chrono::Utc>, _>(i)?.to_rfc3339()),
        Decoder::Json => row.try_get::<Value, _>(i)?,
        Decoder::Bytea => json!(base64::engine::general_purpose::STANDARD.encode(row.try_get::<Vec<u8>, _>(i)?)),
        Decoder::TextArray => json!(row.try_get::<Vec<String>, _>(i)?),
        Decoder::Int4Array => json!(row.try_get::<Vec<i32>, _>(i)?),
        Decoder::Int8Array => json!(row.try_get::<Vec<i64>, _>(i)?),
        Decoder::Label => Value::String(row.try_get_unchecked::<String, _>(i)?),
    };
    Ok(value)
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    fn backend(&self) -> &str {
        "postgres"
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, QueryError> {
        debug!(sql, "Executing PostgreSQL query");
        let result = with_deadline(self.query_timeout, self.fetch(sql)).await;
        if let Err(e) = &result {
            debug!(error = %e, "PostgreSQL query failed");
        }
        result
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_types_have_decoders() {
        assert_eq!(decoder_for("INT4", false), Some(Decoder::Int4));
        assert_eq!(decoder_for("NUMERIC", false), Some(Decoder::Numeric));
        assert_eq!(decoder_for("BPCHAR", false), Some(Decoder::Text));
        assert_eq!(decoder_for("TIMESTAMPTZ", false), Some(Decoder::Timestamptz));
        assert_eq!(decoder_for("TIME", false), Some(Decoder::Time));
        assert_eq!(decoder_for("JSONB", false), Some(Decoder::Json));
    }

    #[test]
    fn text_and_integer_arrays_have_decoders() {
        assert_eq!(decoder_for("TEXT[]", false), Some(Decoder::TextArray));
        assert_eq!(decoder_for("INT4[]", false), Some(Decoder::Int4Array));
        assert_eq!(decoder_for("INT8[]", false), Some(Decoder::Int8Array));
    }

    #[test]
    fn enums_decode_as_labels() {
        assert_eq!(decoder_for("mpaa_rating", true), Some(Decoder::Label));
        assert_eq!(decoder_for("mpaa_rating", false), None);
    }

    #[test]
    fn binary_only_types_are_refused() {
        for name in ["INTERVAL", "TSVECTOR", "POINT", "INT4RANGE", "INT2[]", "TIMESTAMP[]"] {
            assert_eq!(decoder_for(name, false), None, "{name}");
        }
    }

    #[test]
    fn refusal_suggests_a_cast() {
        let err = unsupported("fulltext", "TSVECTOR");
        assert!(matches!(err, QueryError::Unexpected(_)));
        assert_eq!(
            err.to_string(),
            "An unexpected error occurred: column 'fulltext' has unsupported type TSVECTOR; \
             cast it to text (e.g. fulltext::text)"
        );
    }
}
