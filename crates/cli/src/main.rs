//! QueryBridge CLI — the main entry point.
//!
//! Commands:
//! - `serve`  — Answer Discord mentions
//! - `ask`    — Answer one question and exit
//! - `chat`   — Ask questions from the terminal
//! - `doctor` — Diagnose config, secrets, database and provider
//! - `init`   — Write a default config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "querybridge",
    about = "QueryBridge — answer chat questions by letting an LLM query your database",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.querybridge/config.toml)
    #[arg(short, long, global = true, env = "QUERYBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and answer mentions
    Serve,

    /// Answer a single question and print the result
    Ask {
        /// The question, in plain language
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Also print every tool call and its output
        #[arg(long)]
        trace: bool,
    },

    /// Ask questions interactively from the terminal
    Chat,

    /// Diagnose configuration and connectivity
    Doctor,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Serve => commands::serve::run(config).await?,
        Commands::Ask { question, trace } => {
            commands::ask::run(config, &question.join(" "), trace).await?
        }
        Commands::Chat => commands::chat::run(config).await?,
        Commands::Doctor => commands::doctor::run(config).await?,
        Commands::Init { force } => commands::init::run(config, force).await?,
    }

    Ok(())
}
