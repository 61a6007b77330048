//! CLI channel — interactive terminal-based chat.
//!
//! Reads questions from stdin, writes answers to stdout. Used by
//! `querybridge chat`. Each line is an independent question.

use async_trait::async_trait;
use querybridge_core::channel::{Channel, ChannelId, ChannelMessage};
use querybridge_core::error::ChannelError;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Inputs that end the session.
pub const EXIT_WORDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

pub fn is_exit_word(line: &str) -> bool {
    EXIT_WORDS.contains(&line)
}

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("cli".into()),
        }
    }

    fn to_message(channel_id: &ChannelId, seq: u64, line: String) -> ChannelMessage {
        ChannelMessage {
            channel_id: channel_id.clone(),
            message_id: seq.to_string(),
            chat_id: "cli_session".into(),
            sender_id: "local_user".into(),
            sender_name: Some("User".into()),
            content: line,
            mentions: vec![],
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();
            let mut seq = 0u64;

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if is_exit_word(&line) {
                            break;
                        }

                        seq += 1;
                        let msg = Self::to_message(&channel_id, seq, line);
                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(
        &self,
        _chat_id: &str,
        content: &str,
        _reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        println!("{content}");
        Ok(())
    }
}
