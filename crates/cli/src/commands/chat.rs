//! `querybridge chat` — Ask questions from the terminal.

use super::{CommandResult, build_agent, load_config};
use querybridge_channels::CliChannel;
use querybridge_core::channel::Channel;
use std::io::Write;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> CommandResult {
    let config = load_config(config_path)?;
    let pipeline = build_agent(&config).await?;

    println!();
    println!("  QueryBridge — Interactive Mode");
    println!();
    println!("  Model:     {}", pipeline.agent.model());
    println!(
        "  Database:  {}",
        querybridge_database::redact_url(&config.database.url)
    );
    println!();
    println!("  Each line is a separate question.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let channel = CliChannel::new();
    let mut rx = channel
        .start()
        .await
        .map_err(|e| format!("Channel error: {e}"))?;

    prompt()?;
    while let Some(result) = rx.recv().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                eprintln!("  Input error: {e}");
                break;
            }
        };

        eprint!("  ...");
        let reply = pipeline.agent.run(&message.content).await;
        eprint!("\r     \r");

        match reply {
            Ok(answer) => channel.send(&message.chat_id, &answer, None).await?,
            Err(e) => eprintln!("  Error: {e}"),
        }
        println!();
        prompt()?;
    }

    pipeline.shutdown().await;
    println!();
    println!("  Goodbye!");
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
