//! Final adjudication of the bucket.
//!
//! The [`Arbitrator`] receives every upstream signal in an
//! [`ArbitrationContext`] and commits to exactly one bucket, citing only the
//! evidence it was handed. [`ArbitrationDecision::validate`] checks that
//! contract and is applied to every decision whichever implementation
//! produced it.
//!
//! [`LlmArbitrator`] pairs a [`ReasoningBackend`] (for example
//! [`OpenAiChatBackend`]) with prompt assembly and strict response parsing.
//! Malformed or contract-violating answers are errors; no fallback bucket is
//! ever synthesized.

#![deny(unsafe_code)]

pub mod arbitrator;
pub mod backend;
pub mod context;
pub mod decision;
pub mod error;
pub mod llm;
pub mod parse;
pub mod prompt;

pub use arbitrator::Arbitrator;
pub use backend::{OpenAiChatBackend, ReasoningBackend, ReasoningRequest};
pub use context::ArbitrationContext;
pub use decision::ArbitrationDecision;
pub use error::ArbitrationError;
pub use llm::LlmArbitrator;
pub use parse::parse_decision;
pub use prompt::{render_template, PromptBuilder, DEFAULT_TEMPLATE, SYSTEM_PROMPT};
