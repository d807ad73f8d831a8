//! Model orchestration for diff audits and commit messages.
//!
//! Provides the prompt templates, the Azure OpenAI chat client, the tool
//! registry used to coerce an audit into a [`RiskScore`](diffsentry_core::RiskScore),
//! and the [`ReviewPipeline`](pipeline::ReviewPipeline) tying them together.

pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod tools;
