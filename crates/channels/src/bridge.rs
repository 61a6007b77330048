//! The bridge between a chat channel and the conversation loop.
//!
//! Only messages that mention the bot, from someone other than the bot, are
//! answered. Each one runs in its own task so the channel keeps receiving
//! while the model and the database work.

use querybridge_agent::ConversationLoop;
use querybridge_config::AppConfig;
use querybridge_core::channel::{Channel, ChannelMessage};
use querybridge_core::error::ChannelError;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Reactions, failure text and concurrency for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub working_emoji: String,
    pub done_emoji: String,
    pub failed_emoji: String,
    pub failure_message: String,
    pub max_in_flight: Option<usize>,
}

impl BridgeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            working_emoji: config.discord.working_emoji.clone(),
            done_emoji: config.discord.done_emoji.clone(),
            failed_emoji: config.discord.failed_emoji.clone(),
            failure_message: config.discord.failure_message.clone(),
            max_in_flight: config.bridge.max_in_flight,
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Answers mentions arriving on a channel.
pub struct Bridge {
    channel: Arc<dyn Channel>,
    agent: Arc<ConversationLoop>,
    settings: Arc<BridgeSettings>,
    permits: Option<Arc<Semaphore>>,
}

impl Bridge {
    pub fn new(channel: Arc<dyn Channel>, agent: Arc<ConversationLoop>, settings: BridgeSettings) -> Self {
        let permits = settings.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));
        Self {
            channel,
            agent,
            settings: Arc::new(settings),
            permits,
        }
    }

    /// Whether a message is addressed to the bot and not written by it.
    pub fn should_handle(message: &ChannelMessage, self_id: Option<&str>) -> bool {
        let Some(self_id) = self_id else {
            return false;
        };
        message.sender_id != self_id && message.mentions_user(self_id)
    }

    /// Remove the bot's mention tokens (`<@id>` and `<@!id>`) from the text.
    pub fn question_text(content: &str, self_id: &str) -> String {
        content
            .replace(&format!("<@!{self_id}>"), "")
            .replace(&format!("<@{self_id}>"), "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Consume the channel until it closes, answering every mention.
    ///
    /// Returns once the channel's stream ends and all in-flight answers
    /// have been delivered. A lost connection is returned as the error
    /// after draining, so the caller can tell it from a clean close.
    pub async fn run(&self) -> Result<(), ChannelError> {
        let mut inbound = self.channel.start().await?;
        let mut tasks = JoinSet::new();
        let mut lost: Option<ChannelError> = None;

        info!(
            channel = self.channel.name(),
            max_in_flight = ?self.settings.max_in_flight,
            "Bridge listening"
        );

        while let Some(next) = inbound.recv().await {
            while tasks.try_join_next().is_some() {}

            let message = match next {
                Ok(message) => message,
                Err(e @ ChannelError::ConnectionLost(_)) => {
                    error!(channel = self.channel.name(), error = %e, "Channel connection lost");
                    lost = Some(e);
                    continue;
                }
                Err(e) => {
                    warn!(channel = self.channel.name(), error = %e, "Channel error");
                    continue;
                }
            };

            let self_id = self.channel.self_id();
            if !Self::should_handle(&message, self_id.as_deref()) {
                debug!(chat_id = %message.chat_id, message_id = %message.message_id, "Ignoring message");
                continue;
            }

            let question = Self::question_text(&message.content, self_id.as_deref().unwrap_or_default());
            let channel = self.channel.clone();
            let agent = self.agent.clone();
            let settings = self.settings.clone();
            let permits = self.permits.clone();

            tasks.spawn(async move {
                let _permit = match permits {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                answer(channel.as_ref(), &agent, &settings, &message, &question).await;
            });
        }

        info!(channel = self.channel.name(), pending = tasks.len(), "Channel closed, draining");
        while tasks.join_next().await.is_some() {}
        match lost {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Mark the message as in progress, answer it, and mark the outcome.
async fn answer(
    channel: &dyn Channel,
    agent: &ConversationLoop,
    settings: &BridgeSettings,
    message: &ChannelMessage,
    question: &str,
) {
    let chat_id = message.chat_id.as_str();
    let message_id = message.message_id.as_str();

    info!(chat_id, message_id, sender = %message.sender_id, "Answering mention");

    if let Err(e) = channel
        .add_reaction(chat_id, message_id, &settings.working_emoji)
        .await
    {
        warn!(chat_id, error = %e, "Failed to add working reaction");
    }
    if let Err(e) = channel.send_typing(chat_id).await {
        debug!(chat_id, error = %e, "Typing indicator failed");
    }

    let (reply, marker) = match agent.run(question).await {
        Ok(answer) => (answer, &settings.done_emoji),
        Err(e) => {
            warn!(chat_id, message_id, error = %e, "Conversation failed");
            (settings.failure_message.clone(), &settings.failed_emoji)
        }
    };

    if let Err(e) = channel.send(chat_id, &reply, None).await {
        warn!(chat_id, error = %e, "Failed to deliver reply");
    }
    if let Err(e) = channel.add_reaction(chat_id, message_id, marker).await {
        warn!(chat_id, error = %e, "Failed to add outcome reaction");
    }
    if let Err(e) = channel
        .remove_reaction(chat_id, message_id, &settings.working_emoji)
        .await
    {
        warn!(chat_id, error = %e, "Failed to remove working reaction");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use querybridge_core::channel::ChannelId;
    use querybridge_core::error::{ProviderError, ToolError};
    use querybridge_core::message::{Message, ToolCallRequest};
    use querybridge_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use querybridge_core::tool::{Tool, ToolRegistry};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    const BOT: &str = "900";

    /// Feeds prepared messages, then closes; records every outbound call.
    struct FakeChannel {
        id: ChannelId,
        inbound: Mutex<Vec<Result<ChannelMessage, ChannelError>>>,
        events: Mutex<Vec<String>>,
    }

    impl FakeChannel {
        fn new(inbound: Vec<ChannelMessage>) -> Arc<Self> {
            Self::with_items(inbound.into_iter().map(Ok).collect())
        }

        fn with_items(inbound: Vec<Result<ChannelMessage, ChannelError>>) -> Arc<Self> {
            Arc::new(Self {
                id: ChannelId("fake".into()),
                inbound: Mutex::new(inbound),
                events: Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[async_trait]
    impl Channel for FakeChannel {
        fn name(&self) -> &str {
            "fake"
        }
        fn id(&self) -> &ChannelId {
            &self.id
        }
        fn self_id(&self) -> Option<String> {
            Some(BOT.into())
        }
        async fn start(
            &self,
        ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
            let messages = std::mem::take(&mut *self.inbound.lock().unwrap());
            let (tx, rx) = mpsc::channel(messages.len().max(1));
            for message in messages {
                let _ = tx.try_send(message);
            }
            Ok(rx)
        }
        async fn send(&self, chat_id: &str, content: &str, _reply_to: Option<&str>) -> Result<(), ChannelError> {
            self.record(format!("send {chat_id} {content}"));
            Ok(())
        }
        async fn add_reaction(&self, _chat_id: &str, message_id: &str, emoji: &str) -> Result<(), ChannelError> {
            self.record(format!("react {message_id} {emoji}"));
            Ok(())
        }
        async fn remove_reaction(&self, _chat_id: &str, message_id: &str, emoji: &str) -> Result<(), ChannelError> {
            self.record(format!("unreact {message_id} {emoji}"));
            Ok(())
        }
    }

    /// Answers with one query round, then echoes the question back.
    struct EchoProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let output = if request.input.len() == 1 {
                vec![Message::ToolCall(ToolCallRequest::new("c1", "query", r#"{"sql":"SELECT 1"}"#))]
            } else {
                vec![Message::assistant(format!("answer to: {}", request.input[0].text().unwrap_or("")))]
            };
            Ok(ProviderResponse {
                output,
                usage: None,
                model: "echo".into(),
            })
        }
    }

    struct DownProvider;

    #[async_trait]
    impl Provider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }
        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    struct NoopQuery;

    #[async_trait]
    impl Tool for NoopQuery {
        fn name(&self) -> &str {
            "query"
        }
        fn description(&self) -> &str {
            "Run a SQL query on the database"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {"sql": {"type": "string"}}, "required": ["sql"]})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
            Ok("[]".into())
        }
    }

    fn agent(provider: Arc<dyn Provider>) -> Arc<ConversationLoop> {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(NoopQuery));
        Arc::new(ConversationLoop::new(provider, Arc::new(tools), "gpt-5"))
    }

    fn message(id: &str, sender: &str, content: &str, mentions: &[&str]) -> ChannelMessage {
        ChannelMessage {
            channel_id: ChannelId("fake".into()),
            message_id: id.into(),
            chat_id: "general".into(),
            sender_id: sender.into(),
            sender_name: None,
            content: content.into(),
            mentions: mentions.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn mention_filter() {
        let mentioned = message("1", "42", "<@900> hi", &[BOT]);
        assert!(Bridge::should_handle(&mentioned, Some(BOT)));

        let unmentioned = message("2", "42", "hi all", &[]);
        assert!(!Bridge::should_handle(&unmentioned, Some(BOT)));

        let own = message("3", BOT, "<@900> talking to myself", &[BOT]);
        assert!(!Bridge::should_handle(&own, Some(BOT)));

        assert!(!Bridge::should_handle(&mentioned, None));
    }

    #[test]
    fn mention_tokens_are_stripped() {
        assert_eq!(
            Bridge::question_text("<@900> how many films are there?", BOT),
            "how many films are there?"
        );
        assert_eq!(Bridge::question_text("hey <@!900>, top actor?", BOT), "hey , top actor?");
        assert_eq!(Bridge::question_text("ask <@123> too", BOT), "ask <@123> too");
    }

    #[tokio::test]
    async fn answers_mentions_with_reactions_in_order() {
        let channel = FakeChannel::new(vec![
            message("1", "42", "just chatting", &[]),
            message("2", BOT, "<@900> my own message", &[BOT]),
            message("3", "42", "<@900> how many films?", &[BOT]),
        ]);
        let provider = Arc::new(EchoProvider {
            calls: AtomicUsize::new(0),
        });
        let bridge = Bridge::new(channel.clone(), agent(provider.clone()), BridgeSettings::default());

        bridge.run().await.unwrap();

        assert_eq!(
            channel.events(),
            [
                "react 3 ⏳",
                "send general answer to: how many films?",
                "react 3 ✅",
                "unreact 3 ⏳",
            ]
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn provider_failure_posts_failure_message() {
        let channel = FakeChannel::new(vec![message("7", "42", "<@900> anything", &[BOT])]);
        let settings = BridgeSettings {
            failure_message: "The model is unavailable.".into(),
            ..BridgeSettings::default()
        };
        let bridge = Bridge::new(channel.clone(), agent(Arc::new(DownProvider)), settings);

        bridge.run().await.unwrap();

        assert_eq!(
            channel.events(),
            [
                "react 7 ⏳",
                "send general The model is unavailable.",
                "react 7 ❌",
                "unreact 7 ⏳",
            ]
        );
    }

    #[tokio::test]
    async fn every_mention_gets_its_own_answer() {
        let channel = FakeChannel::new(vec![
            message("1", "42", "<@900> first", &[BOT]),
            message("2", "43", "<@900> second", &[BOT]),
        ]);
        let provider = Arc::new(EchoProvider {
            calls: AtomicUsize::new(0),
        });
        let settings = BridgeSettings {
            max_in_flight: Some(1),
            ..BridgeSettings::default()
        };
        let bridge = Bridge::new(channel.clone(), agent(provider), settings);

        bridge.run().await.unwrap();

        let events = channel.events();
        assert!(events.contains(&"send general answer to: first".to_string()));
        assert!(events.contains(&"send general answer to: second".to_string()));
        assert_eq!(events.iter().filter(|e| e.starts_with("react") && e.ends_with('✅')).count(), 2);
    }

    #[tokio::test]
    async fn lost_connection_is_reported_after_draining() {
        let channel = FakeChannel::with_items(vec![
            Ok(message("5", "42", "<@900> still answered?", &[BOT])),
            Err(ChannelError::ConnectionLost("Disallowed gateway intents".into())),
        ]);
        let provider = Arc::new(EchoProvider {
            calls: AtomicUsize::new(0),
        });
        let bridge = Bridge::new(channel.clone(), agent(provider), BridgeSettings::default());

        let err = bridge.run().await.unwrap_err();

        assert!(matches!(err, ChannelError::ConnectionLost(ref reason) if reason.contains("intents")));
        assert!(channel.events().contains(&"send general answer to: still answered?".to_string()));
    }

    #[tokio::test]
    async fn other_channel_errors_are_skipped() {
        let channel = FakeChannel::with_items(vec![
            Err(ChannelError::InvalidId("bad snowflake".into())),
            Ok(message("6", "42", "<@900> after the hiccup", &[BOT])),
        ]);
        let provider = Arc::new(EchoProvider {
            calls: AtomicUsize::new(0),
        });
        let bridge = Bridge::new(channel.clone(), agent(provider), BridgeSettings::default());

        bridge.run().await.unwrap();

        assert!(channel.events().contains(&"send general answer to: after the hiccup".to_string()));
    }
}
