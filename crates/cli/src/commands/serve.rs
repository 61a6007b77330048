//! `querybridge serve` — Answer Discord mentions until interrupted.

use super::{CommandResult, build_agent, load_config};
use querybridge_channels::{Bridge, BridgeSettings, DiscordChannel};
use querybridge_core::channel::Channel;
use querybridge_core::database::QueryExecutor;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

pub async fn run(config_path: Option<&Path>) -> CommandResult {
    let config = load_config(config_path)?;

    // build_agent checks the API key before opening the database.
    let token = config.require_discord_token()?.to_string();

    let pipeline = build_agent(&config).await?;
    let executor = pipeline.executor.clone();
    let agent = Arc::new(pipeline.agent);
    let channel = Arc::new(DiscordChannel::new(token));
    let bridge = Bridge::new(channel.clone(), agent, BridgeSettings::from_config(&config));

    println!("🔎 QueryBridge — serving Discord mentions");
    println!("   Model:    {}", config.provider.model);
    println!(
        "   Database: {}",
        querybridge_database::redact_url(&config.database.url)
    );
    println!("   Press Ctrl+C to stop.");

    tokio::select! {
        result = bridge.run() => {
            if let Err(e) = &result {
                error!(error = %e, "Bridge stopped");
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    channel.stop().await?;
    executor.close().await;
    Ok(())
}
