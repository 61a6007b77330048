//! Query executors for QueryBridge.
//!
//! Each backend implements [`QueryExecutor`] over a `sqlx` pool and renders
//! rows as ordered column → JSON scalar maps.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

use querybridge_config::DatabaseConfig;
use querybridge_core::database::QueryExecutor;
use querybridge_core::error::QueryError;
use std::sync::Arc;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteExecutor;

#[cfg(feature = "postgres")]
pub use postgres::PostgresExecutor;

/// Open an executor for the configured URL, picking the backend by scheme.
///
/// - `sqlite://path/to/db.sqlite`, `sqlite::memory:` → [`SqliteExecutor`]
/// - `postgres://…`, `postgresql://…` → `PostgresExecutor` (feature `postgres`)
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn QueryExecutor>, QueryError> {
    let url = config.url.as_str();

    if url.starts_with("sqlite:") {
        #[cfg(feature = "sqlite")]
        {
            let executor = SqliteExecutor::connect(url, config.max_connections)
                .await?
                .with_query_timeout(config.query_timeout());
            return Ok(Arc::new(executor));
        }
        #[cfg(not(feature = "sqlite"))]
        return Err(QueryError::Unexpected(
            "SQLite support was not compiled in (enable the `sqlite` feature)".into(),
        ));
    }

    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        #[cfg(feature = "postgres")]
        {
            let executor = PostgresExecutor::connect(url, config.max_connections)
                .await?
                .with_query_timeout(config.query_timeout());
            return Ok(Arc::new(executor));
        }
        #[cfg(not(feature = "postgres"))]
        return Err(QueryError::Unexpected(
            "PostgreSQL support was not compiled in (enable the `postgres` feature)".into(),
        ));
    }

    Err(QueryError::Unexpected(format!(
        "Unsupported database URL scheme: {}",
        redact_url(url)
    )))
}

/// Map a driver error onto the two failure kinds the model distinguishes.
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) fn map_sqlx_error(error: sqlx::Error) -> QueryError {
    match error {
        sqlx::Error::Database(db) => QueryError::Database(db.message().to_string()),
        other => QueryError::Unexpected(other.to_string()),
    }
}

/// Run a query future under an optional deadline.
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) async fn with_deadline<T>(
    timeout: Option<std::time::Duration>,
    fut: impl std::future::Future<Output = Result<T, QueryError>>,
) -> Result<T, QueryError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            QueryError::Unexpected(format!("query timed out after {}s", limit.as_secs()))
        })?,
        None => fut.await,
    }
}

/// Strip credentials from a URL before it reaches a log line.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => url.to_string(),
    }
}
