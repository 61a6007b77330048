//! `querybridge ask` — Answer one question and exit.

use super::{CommandResult, build_agent, load_config};
use querybridge_core::message::Message;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, question: &str, trace: bool) -> CommandResult {
    let config = load_config(config_path)?;
    let pipeline = build_agent(&config).await?;

    eprint!("  Thinking...");
    let outcome = pipeline.agent.run_conversation(question).await;
    eprint!("\r              \r");
    pipeline.shutdown().await;
    let outcome = outcome?;

    if trace {
        for message in outcome.conversation.messages() {
            match message {
                Message::ToolCall(call) => eprintln!("  → {}({})", call.name, call.arguments),
                Message::ToolResult(result) => eprintln!("  ← {}", result.output),
                _ => {}
            }
        }
        eprintln!("  ({} rounds)", outcome.rounds);
    }

    println!("{}", outcome.answer);
    Ok(())
}
