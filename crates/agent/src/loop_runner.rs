//! The conversation loop implementation.

use crate::instructions::{self, DEFAULT_INSTRUCTIONS};
use querybridge_config::{AgentConfig, ConfigError, ProviderConfig};
use querybridge_core::error::{Error, ProviderError};
use querybridge_core::message::{Conversation, Message};
use querybridge_core::provider::{Provider, ProviderRequest, ProviderResponse, ReasoningEffort};
use querybridge_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the loop is within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    AwaitingModel,
    DispatchingTools,
}

/// What a finished conversation produced.
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    /// The model's final text
    pub answer: String,

    /// Provider calls made
    pub rounds: u32,

    /// Full history, including tool calls and results
    pub conversation: Conversation,
}

/// Drives one question to an answer through repeated model rounds.
///
/// The loop holds no per-conversation state, so one instance can serve many
/// questions concurrently.
pub struct ConversationLoop {
    /// The completion service
    provider: Arc<dyn Provider>,

    /// Tools offered to the model
    tools: Arc<ToolRegistry>,

    /// The model to request
    model: String,

    /// System instructions sent on every round
    instructions: String,

    reasoning_effort: Option<ReasoningEffort>,

    max_output_tokens: Option<u32>,

    /// Fail after this many rounds instead of looping forever
    max_rounds: Option<u32>,

    /// Bound on each completion call
    round_timeout: Option<Duration>,
}

impl ConversationLoop {
    /// Create a loop with the default Sakila briefing and no limits.
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            reasoning_effort: None,
            max_output_tokens: None,
            max_rounds: None,
            round_timeout: None,
        }
    }

    /// Create a loop from the provider and agent config sections.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        provider_config: &ProviderConfig,
        agent_config: &AgentConfig,
    ) -> Result<Self, ConfigError> {
        let mut this = Self::new(provider, tools, &provider_config.model)
            .with_instructions(instructions::resolve(agent_config)?)
            .with_round_timeout(agent_config.round_timeout());
        this.reasoning_effort = provider_config.reasoning_effort;
        this.max_output_tokens = provider_config.max_output_tokens;
        this.max_rounds = agent_config.max_rounds;
        Ok(this)
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    /// Cap the number of provider calls per question.
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = Some(max);
        self
    }

    /// Bound each completion call. `None` waits indefinitely.
    pub fn with_round_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.round_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Answer a question, returning only the final text.
    pub async fn run(&self, question: &str) -> Result<String, Error> {
        self.run_conversation(question).await.map(|outcome| outcome.answer)
    }

    /// Answer a question, returning the answer with the full history.
    ///
    /// Each round sends the whole history. Every output item is appended in
    /// the order received; each tool call is dispatched in order and its
    /// result appended with the same call id. The first round without a tool
    /// call ends the conversation.
    pub async fn run_conversation(&self, question: &str) -> Result<ConversationOutcome, Error> {
        let mut conversation = Conversation::with_question(question);
        let declarations = self.tools.declarations();
        let mut rounds: u32 = 0;

        info!(
            conversation_id = %conversation.id,
            model = %self.model,
            "Answering question"
        );

        loop {
            rounds += 1;
            self.transition(&conversation, LoopState::AwaitingModel, rounds);

            let request = ProviderRequest {
                model: self.model.clone(),
                instructions: self.instructions.clone(),
                input: conversation.messages().to_vec(),
                tools: declarations.clone(),
                reasoning_effort: self.reasoning_effort,
                max_output_tokens: self.max_output_tokens,
            };

            let response = self.complete(request).await?;

            if let Some(usage) = &response.usage {
                debug!(
                    conversation_id = %conversation.id,
                    round = rounds,
                    tokens = usage.total_tokens,
                    "Round usage"
                );
            }

            let calls: Vec<_> = response.tool_calls().cloned().collect();
            if calls.is_empty() {
                let answer = response.output_text();
                conversation.extend(response.output);
                info!(
                    conversation_id = %conversation.id,
                    rounds,
                    "Conversation complete"
                );
                return Ok(ConversationOutcome {
                    answer,
                    rounds,
                    conversation,
                });
            }

            conversation.extend(response.output);

            if let Some(max_rounds) = self.max_rounds
                && rounds >= max_rounds
            {
                warn!(
                    conversation_id = %conversation.id,
                    max_rounds,
                    pending_calls = calls.len(),
                    "Round limit reached with tool calls outstanding"
                );
                return Err(Error::RoundLimit { max_rounds });
            }

            self.transition(&conversation, LoopState::DispatchingTools, rounds);
            for call in &calls {
                debug!(
                    conversation_id = %conversation.id,
                    round = rounds,
                    tool = %call.name,
                    call_id = %call.call_id,
                    "Dispatching tool call"
                );
                let result = self.tools.dispatch(call).await;
                conversation.push(Message::ToolResult(result));
            }
        }
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.round_timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.complete(request))
                .await
                .map_err(|_| {
                    ProviderError::Timeout(format!(
                        "no response from {} within {}s",
                        self.provider.name(),
                        limit.as_secs()
                    ))
                })?,
            None => self.provider.complete(request).await,
        }
    }

    fn transition(&self, conversation: &Conversation, state: LoopState, round: u32) {
        debug!(
            conversation_id = %conversation.id,
            round,
            state = ?state,
            history = conversation.len(),
            "Loop state"
        );
    }
}
