//! Discord channel adapter.
//!
//! Listens on the Discord gateway through `serenity` and talks back through
//! its REST client. Inbound messages are forwarded with their mention list;
//! deciding whether to answer is left to the bridge.

use async_trait::async_trait;
use querybridge_core::channel::{Channel, ChannelId, ChannelMessage};
use querybridge_core::error::ChannelError;
use serenity::all::{
    ChannelId as DiscordChannelId, Client, Context, EventHandler, GatewayIntents, Http,
    Message as DiscordMessage, MessageId, ReactionType, Ready, ShardManager,
};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Maximum characters Discord accepts in one message.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Discord channel adapter.
pub struct DiscordChannel {
    token: String,
    http: Arc<Http>,
    channel_id: ChannelId,
    bot_id: Arc<OnceLock<String>>,
    shard_manager: tokio::sync::Mutex<Option<Arc<ShardManager>>>,
}

impl std::fmt::Debug for DiscordChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordChannel")
            .field("token", &"[REDACTED]")
            .field("bot_id", &self.bot_id.get())
            .finish()
    }
}

impl DiscordChannel {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            http: Arc::new(Http::new(&token)),
            token,
            channel_id: ChannelId("discord".into()),
            bot_id: Arc::new(OnceLock::new()),
            shard_manager: tokio::sync::Mutex::new(None),
        }
    }

    fn parse_channel(chat_id: &str) -> Result<DiscordChannelId, ChannelError> {
        chat_id
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(DiscordChannelId::new)
            .ok_or_else(|| ChannelError::InvalidId(format!("Discord channel id '{chat_id}'")))
    }

    fn parse_message(message_id: &str) -> Result<MessageId, ChannelError> {
        message_id
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(MessageId::new)
            .ok_or_else(|| ChannelError::InvalidId(format!("Discord message id '{message_id}'")))
    }

    fn delivery_failed(reason: impl std::fmt::Display) -> ChannelError {
        ChannelError::DeliveryFailed {
            channel: "discord".into(),
            reason: reason.to_string(),
        }
    }
}

/// Forwards gateway events into the channel's receiver.
struct Handler {
    tx: mpsc::Sender<Result<ChannelMessage, ChannelError>>,
    channel_id: ChannelId,
    bot_id: Arc<OnceLock<String>>,
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        let id = ready.user.id.to_string();
        info!(user = %ready.user.name, id = %id, "Discord gateway ready");
        let _ = self.bot_id.set(id);
    }

    async fn message(&self, _ctx: Context, msg: DiscordMessage) {
        let inbound = ChannelMessage {
            channel_id: self.channel_id.clone(),
            message_id: msg.id.to_string(),
            chat_id: msg.channel_id.to_string(),
            sender_id: msg.author.id.to_string(),
            sender_name: Some(msg.author.name.clone()),
            content: msg.content,
            mentions: msg.mentions.iter().map(|u| u.id.to_string()).collect(),
        };

        debug!(
            chat_id = %inbound.chat_id,
            message_id = %inbound.message_id,
            mentions = inbound.mentions.len(),
            "Discord message received"
        );

        if self.tx.send(Ok(inbound)).await.is_err() {
            debug!("Discord receiver dropped, discarding message");
        }
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    fn self_id(&self) -> Option<String> {
        self.bot_id.get().cloned()
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        // Resolve our own id up front so no early message slips past the mention filter.
        let me = self
            .http
            .get_current_user()
            .await
            .map_err(|e| ChannelError::NotConfigured(format!("Discord login failed: {e}")))?;
        let _ = self.bot_id.set(me.id.to_string());
        info!(user = %me.name, "Discord channel starting");

        let (tx, rx) = mpsc::channel(64);
        let handler = Handler {
            tx: tx.clone(),
            channel_id: self.channel_id.clone(),
            bot_id: self.bot_id.clone(),
        };

        let intents = GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let mut client = Client::builder(&self.token, intents)
            .event_handler(handler)
            .await
            .map_err(|e| ChannelError::NotConfigured(format!("Discord client: {e}")))?;

        *self.shard_manager.lock().await = Some(client.shard_manager.clone());

        tokio::spawn(async move {
            if let Err(e) = client.start().await {
                error!(error = %e, "Discord gateway stopped");
                let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
            }
        });

        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        let channel = Self::parse_channel(chat_id)?;
        let chunks = split_message(content, DISCORD_MESSAGE_LIMIT);
        if chunks.is_empty() {
            warn!(chat_id = %chat_id, "Refusing to send an empty Discord message");
            return Ok(());
        }

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = serde_json::json!({ "content": chunk });
            if let (0, Some(reply_to)) = (i, reply_to) {
                body["message_reference"] = serde_json::json!({ "message_id": reply_to });
            }
            self.http
                .send_message(channel, Vec::new(), &body)
                .await
                .map_err(Self::delivery_failed)?;
        }

        debug!(chat_id = %chat_id, chunks = chunks.len(), "Discord message sent");
        Ok(())
    }

    async fn add_reaction(
        &self,
        chat_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ChannelError> {
        self.http
            .create_reaction(
                Self::parse_channel(chat_id)?,
                Self::parse_message(message_id)?,
                &ReactionType::Unicode(emoji.to_string()),
            )
            .await
            .map_err(Self::delivery_failed)
    }

    async fn remove_reaction(
        &self,
        chat_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ChannelError> {
        self.http
            .delete_reaction_me(
                Self::parse_channel(chat_id)?,
                Self::parse_message(message_id)?,
                &ReactionType::Unicode(emoji.to_string()),
            )
            .await
            .map_err(Self::delivery_failed)
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        self.http
            .broadcast_typing(Self::parse_channel(chat_id)?)
            .await
            .map_err(Self::delivery_failed)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Discord channel stopping");
        if let Some(manager) = self.shard_manager.lock().await.take() {
            manager.shutdown_all().await;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(self.http.get_current_user().await.is_ok())
    }
}

/// Split text into chunks of at most `limit` characters.
///
/// Breaks on line boundaries where possible; a single line longer than the
/// limit is cut at character boundaries. Blank input yields no chunks.
pub fn split_message(content: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in content.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let mut piece = String::new();
            let mut piece_len = 0;
            for c in line.chars() {
                if piece_len == limit {
                    chunks.push(std::mem::take(&mut piece));
                    piece_len = 0;
                }
                piece.push(c);
                piece_len += 1;
            }
            current = piece;
            current_len = piece_len;
        } else {
            current.push_str(line);
            current_len += line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discord_channel_properties() {
        let ch = DiscordChannel::new("secret-bot-token");
        assert_eq!(ch.name(), "discord");
        assert_eq!(ch.id().0, "discord");
        assert!(ch.self_id().is_none());
        assert!(!format!("{ch:?}").contains("secret-bot-token"));
    }

    #[test]
    fn id_parsing() {
        assert!(DiscordChannel::parse_channel("1180000000000000000").is_ok());
        assert!(DiscordChannel::parse_channel("general").is_err());
        assert!(DiscordChannel::parse_channel("0").is_err());
        assert!(DiscordChannel::parse_message("42").is_ok());
    }

    #[test]
    fn short_message_is_one_chunk() {
        assert_eq!(split_message("There are 1000 films.", 2000), ["There are 1000 films."]);
    }

    #[test]
    fn empty_message_has_no_chunks() {
        assert!(split_message("", 2000).is_empty());
        assert!(split_message("  \n ", 2000).is_empty());
    }

    #[test]
    fn splits_on_line_boundaries() {
        let content = "aaaa\nbbbb\ncccc\n";
        let chunks = split_message(content, 10);
        assert_eq!(chunks, ["aaaa\nbbbb\n", "cccc\n"]);
        assert_eq!(chunks.concat(), content);
    }

    #[test]
    fn long_line_is_hard_split() {
        let content = "x".repeat(4500);
        let chunks = split_message(&content, DISCORD_MESSAGE_LIMIT);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= DISCORD_MESSAGE_LIMIT));
        assert_eq!(chunks.concat(), content);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let content = "é".repeat(2000);
        assert_eq!(split_message(&content, DISCORD_MESSAGE_LIMIT).len(), 1);
    }
}
