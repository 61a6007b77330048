//! `querybridge init` — Write a default config file.

use super::CommandResult;
use querybridge_config::{API_KEY_VARS, AppConfig, DISCORD_TOKEN_VARS};
use std::path::Path;

pub async fn run(config_path: Option<&Path>, force: bool) -> CommandResult {
    let default_path = AppConfig::config_dir().join("config.toml");
    let path = config_path.unwrap_or(&default_path);

    println!("🔎 QueryBridge — Setup");
    println!("======================\n");

    if path.exists() && !force {
        println!("  Config already exists: {}", path.display());
        println!("  Re-run with --force to overwrite it.");
        return Ok(());
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    println!("✅ Wrote {}", path.display());

    println!();
    println!("  Next steps:");
    println!("    1. Export {} with your OpenAI key", API_KEY_VARS[0]);
    println!("    2. Export {} with your Discord bot token", DISCORD_TOKEN_VARS[0]);
    println!("       (or put both in a .env file in the working directory)");
    println!("    3. Run `querybridge doctor`, then `querybridge serve`");
    Ok(())
}
