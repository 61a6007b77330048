//! Subcommand implementations.

pub mod ask;
pub mod chat;
pub mod doctor;
pub mod init;
pub mod serve;

use querybridge_agent::ConversationLoop;
use querybridge_config::AppConfig;
use querybridge_core::database::QueryExecutor;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub(crate) type CommandResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load(path).map_err(|e| format!("Failed to load config: {e}").into())
}

/// A ready conversation loop and the executor behind its `query` tool.
pub(crate) struct Pipeline {
    pub agent: ConversationLoop,
    pub executor: Arc<dyn QueryExecutor>,
}

impl Pipeline {
    /// Close the database pool.
    pub async fn shutdown(&self) {
        self.executor.close().await;
        info!("Database pool closed");
    }
}

/// Open the database, apply the statement policy and wire up the loop.
///
/// Fails when the API key is missing or the database cannot be opened, so
/// callers never start answering with a broken pipeline.
pub(crate) async fn build_agent(config: &AppConfig) -> Result<Pipeline, Box<dyn std::error::Error>> {
    config.require_api_key()?;

    let executor = querybridge_database::connect(&config.database)
        .await
        .map_err(|e| format!("Failed to open {}: {e}", querybridge_database::redact_url(&config.database.url)))?;
    let executor = querybridge_security::guard(executor, config.database.policy);
    let tools = Arc::new(querybridge_tools::default_registry(executor.clone()));

    let provider = querybridge_providers::build_from_config(&config.provider)?;
    let agent = ConversationLoop::from_config(provider, tools, &config.provider, &config.agent)?;

    info!(
        model = agent.model(),
        policy = ?config.database.policy,
        "Conversation loop ready"
    );
    Ok(Pipeline { agent, executor })
}
