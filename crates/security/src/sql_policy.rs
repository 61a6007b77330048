//! Statement policy enforcement.
//!
//! `ReadOnly` admits a single statement that starts with `SELECT`, `WITH`,
//! `EXPLAIN`, or `VALUES` and contains no write or schema keyword outside of
//! string literals, quoted identifiers, and comments. It is a lexical check,
//! not a parser: it errs toward rejecting.

use async_trait::async_trait;
use querybridge_config::SqlPolicy;
use querybridge_core::database::{QueryExecutor, QueryResult};
use querybridge_core::error::QueryError;
use std::sync::Arc;
use tracing::warn;

const READ_KEYWORDS: &[&str] = &["SELECT", "WITH", "EXPLAIN", "VALUES"];

const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "REPLACE", "UPSERT", "MERGE", "DROP", "ALTER", "CREATE",
    "TRUNCATE", "ATTACH", "DETACH", "PRAGMA", "VACUUM", "REINDEX", "GRANT", "REVOKE", "COPY",
];

/// Check one SQL string against a policy.
pub fn check_statement(policy: SqlPolicy, sql: &str) -> Result<(), QueryError> {
    match policy {
        SqlPolicy::Passthrough => Ok(()),
        SqlPolicy::ReadOnly => check_read_only(sql),
    }
}

fn check_read_only(sql: &str) -> Result<(), QueryError> {
    let code = strip_literals_and_comments(sql);

    let statements: Vec<&str> = code
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let statement = match statements.as_slice() {
        [] => return Err(QueryError::Rejected("empty statement".into())),
        [one] => *one,
        _ => {
            return Err(QueryError::Rejected(
                "only one statement per query is allowed".into(),
            ));
        }
    };

    let mut words = statement
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_uppercase);

    let leading = words.next().unwrap_or_default();
    if !READ_KEYWORDS.contains(&leading.as_str()) {
        return Err(QueryError::Rejected(format!(
            "{leading} statements are not allowed in read-only mode"
        )));
    }

    if let Some(write) = words.find(|w| WRITE_KEYWORDS.contains(&w.as_str())) {
        return Err(QueryError::Rejected(format!(
            "{write} is not allowed in read-only mode"
        )));
    }

    Ok(())
}

/// Blank out everything the keyword scan must not see.
///
/// String literals and quoted identifiers become a single space, comments
/// disappear. Unterminated quotes or comments swallow the rest of the input.
fn strip_literals_and_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                let close = c;
                while let Some(next) = chars.next() {
                    if next == close {
                        // Doubled quote is an escape, not the end.
                        if chars.peek() == Some(&close) {
                            chars.next();
                            continue;
                        }
                        break;
                    }
                }
                out.push(' ');
            }
            '[' => {
                for next in chars.by_ref() {
                    if next == ']' {
                        break;
                    }
                }
                out.push(' ');
            }
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
                out.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}

/// An executor that checks every statement against a policy first.
pub struct GuardedExecutor {
    inner: Arc<dyn QueryExecutor>,
    policy: SqlPolicy,
}

impl GuardedExecutor {
    pub fn new(inner: Arc<dyn QueryExecutor>, policy: SqlPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> SqlPolicy {
        self.policy
    }
}

#[async_trait]
impl QueryExecutor for GuardedExecutor {
    fn backend(&self) -> &str {
        self.inner.backend()
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, QueryError> {
        if let Err(e) = check_statement(self.policy, sql) {
            warn!(policy = ?self.policy, sql, reason = %e, "Statement rejected");
            return Err(e);
        }
        self.inner.execute(sql).await
    }

    async fn health_check(&self) -> Result<bool, QueryError> {
        self.inner.health_check().await
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

/// Apply `policy` to an executor. Passthrough returns it unchanged.
pub fn guard(executor: Arc<dyn QueryExecutor>, policy: SqlPolicy) -> Arc<dyn QueryExecutor> {
    match policy {
        SqlPolicy::Passthrough => executor,
        SqlPolicy::ReadOnly => Arc::new(GuardedExecutor::new(executor, policy)),
    }
}
