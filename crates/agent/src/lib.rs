//! The conversation loop — the heart of QueryBridge.
//!
//! The loop follows an **ask → query → answer** cycle:
//!
//! 1. **Receive** a question (from any channel)
//! 2. **Send** the history, the domain briefing, and the tool declarations
//!    to the completion service
//! 3. **If tool calls**: run them, append the results, loop back to step 2
//! 4. **If text only**: return the answer to the caller
//!
//! There is no iteration limit unless one is configured.

pub mod instructions;
pub mod loop_runner;

pub use instructions::DEFAULT_INSTRUCTIONS;
pub use loop_runner::{ConversationLoop, ConversationOutcome};
