//! `querybridge doctor` — Diagnose configuration and connectivity.

use super::CommandResult;
use querybridge_config::AppConfig;
use querybridge_core::database::QueryExecutor;
use querybridge_core::provider::Provider;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> CommandResult {
    println!("🩺 QueryBridge Doctor — System Diagnostics");
    println!("==========================================\n");

    let mut issues = 0;

    let default_path = AppConfig::config_dir().join("config.toml");
    let path = config_path.unwrap_or(&default_path);
    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file at {}, using defaults (run `querybridge init`)", path.display());
    }

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    match config.require_api_key() {
        Ok(_) => println!("  ✅ API key configured"),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    match config.require_discord_token() {
        Ok(_) => println!("  ✅ Discord token configured"),
        Err(e) => {
            println!("  ⚠️  {e} (only `serve` needs it)");
            issues += 1;
        }
    }

    let db_label = querybridge_database::redact_url(&config.database.url);
    match querybridge_database::connect(&config.database).await {
        Ok(executor) => match executor.health_check().await {
            Ok(true) => println!("  ✅ Database reachable: {db_label} ({})", executor.backend()),
            Ok(false) => {
                println!("  ❌ Database not responding: {db_label}");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Database check failed: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Database unavailable: {e}");
            issues += 1;
        }
    }
    println!("  ℹ️  SQL policy: {:?}", config.database.policy);

    match querybridge_providers::build_from_config(&config.provider) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider reachable: {}", provider.name()),
            Ok(false) => {
                println!("  ❌ Provider not reachable: {}", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider check failed: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Provider misconfigured: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
