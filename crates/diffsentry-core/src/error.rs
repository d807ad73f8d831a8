use miette::Diagnostic;

/// Errors that can occur across diffsentry.
///
/// Library crates return this type directly; the binary turns it into a
/// `miette` report at the boundary.
///
/// # Examples
///
/// ```
/// use diffsentry_core::SentryError;
///
/// let err = SentryError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum SentryError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(diffsentry::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(diffsentry::config),
        help("set the AZURE_OPENAI_* environment variables or add an [llm] section to .diffsentry.toml")
    )]
    Config(String),

    /// Repository could not be opened or a revision could not be resolved.
    #[error("git error: {0}")]
    #[diagnostic(code(diffsentry::git))]
    Git(String),

    /// Model endpoint or response error.
    #[error("LLM error: {0}")]
    #[diagnostic(code(diffsentry::llm))]
    Llm(String),

    /// A tool call requested by the model could not be executed.
    #[error("tool error: {0}")]
    #[diagnostic(code(diffsentry::tool))]
    Tool(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(diffsentry::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(diffsentry::toml))]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SentryError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = SentryError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn config_error_carries_help() {
        let err = SentryError::Config("missing".into());
        let help = err.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("AZURE_OPENAI_"));
    }

    #[test]
    fn git_error_has_diagnostic_code() {
        let err = SentryError::Git("bad revision".into());
        let code = err.code().map(|c| c.to_string()).unwrap_or_default();
        assert_eq!(code, "diffsentry::git");
    }
}
