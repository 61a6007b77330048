//! Chat channel implementations for QueryBridge.
//!
//! Each channel connects to a chat platform and relays messages to and from
//! the conversation loop. Channels are trait-based and platform-agnostic.
//!
//! Available channels:
//! - **Discord** — gateway client via `serenity`
//! - **CLI** — interactive terminal chat (stdin/stdout)
//!
//! The [`Bridge`] wires a channel to a [`ConversationLoop`] and answers the
//! messages that mention the bot.
//!
//! [`ConversationLoop`]: querybridge_agent::ConversationLoop

pub mod bridge;
pub mod cli;
pub mod discord;

pub use bridge::{Bridge, BridgeSettings};
pub use cli::CliChannel;
pub use discord::{DISCORD_MESSAGE_LIMIT, DiscordChannel, split_message};
