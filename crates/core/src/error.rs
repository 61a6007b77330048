//! Error types for the QueryBridge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for a conversation.
///
/// Tool and data-source failures never reach it: they become tool output
/// the model can read.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Conversation loop ---
    #[error("Conversation exceeded the configured limit of {max_rounds} rounds")]
    RoundLimit { max_rounds: u32 },
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Failures from a [`QueryExecutor`](crate::database::QueryExecutor).
///
/// The display strings are what the model sees as tool output, so the
/// prefixes are part of the contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The engine rejected the statement (syntax, constraint, missing table...).
    #[error("Database error: {0}")]
    Database(String),

    /// Anything else: pool closed, I/O, decoding, timeouts.
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),

    /// Refused by a policy layer before reaching the engine.
    #[error("Query rejected by policy: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn query_error_prefixes() {
        let db = QueryError::Database("no such table: FILMS".into());
        assert_eq!(db.to_string(), "Database error: no such table: FILMS");

        let other = QueryError::Unexpected("pool timed out".into());
        assert!(other.to_string().starts_with("An unexpected error occurred: "));
    }

    #[test]
    fn round_limit_mentions_cap() {
        let err = Error::RoundLimit { max_rounds: 8 };
        assert!(err.to_string().contains('8'));
    }
}
