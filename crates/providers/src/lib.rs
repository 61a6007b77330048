//! Completion service providers for QueryBridge.
//!
//! All providers implement the `querybridge_core::Provider` trait.
//! The router builds the configured one.

mod http;
pub mod openai_compat;
pub mod openai_responses;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use openai_responses::OpenAiResponsesProvider;
pub use router::build_from_config;
