//! Core types, configuration, and error handling for diffsentry.
//!
//! This crate provides the shared foundation used by the other crates:
//! - [`SentryError`] — unified error type using `thiserror` and `miette`
//! - [`SentryConfig`] — layered configuration (`.diffsentry.toml` + environment)
//! - Shared types: [`FileDiff`], [`DiffSet`], [`FileStatus`], [`RiskScore`],
//!   [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    LlmConfig, RepoConfig, SentryConfig, DEFAULT_CONFIG_FILE, ENV_ALT_API_KEY, ENV_API_KEY,
    ENV_API_VERSION, ENV_DEPLOYMENT, ENV_ENDPOINT, ENV_TEMPERATURE,
};
pub use error::SentryError;
pub use types::{DiffSet, FileDiff, FileStatus, OutputFormat, RiskScore};

/// A convenience `Result` type for diffsentry operations.
pub type Result<T> = std::result::Result<T, SentryError>;
