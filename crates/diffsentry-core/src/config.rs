use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SentryError;

/// Default configuration file, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".diffsentry.toml";

/// Base URL of the Azure OpenAI resource.
pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
/// API key sent in the `api-key` header.
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
/// `api-version` query parameter.
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
/// Chat deployment (model) name.
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_CHAT_DEPLOYMENT_NAME";
/// Optional sampling temperature override.
pub const ENV_TEMPERATURE: &str = "AZURE_OPENAI_TEMPERATURE";
/// Optional key for an alternate provider. Loaded but not used.
pub const ENV_ALT_API_KEY: &str = "GROQ_API_KEY";

/// Top-level configuration.
///
/// Resolution order: defaults < `.diffsentry.toml` < environment variables.
///
/// # Examples
///
/// ```
/// use diffsentry_core::SentryConfig;
///
/// let config = SentryConfig::default();
/// assert_eq!(config.llm.temperature, 0.5);
/// assert!(config.llm.tools);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentryConfig {
    /// Model endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Repository used by the commands without a `--path` flag.
    #[serde(default)]
    pub repo: RepoConfig,
}

impl SentryConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SentryError::Io`] if the file cannot be read, or
    /// [`SentryError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, SentryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffsentry_core::SentryConfig;
    ///
    /// let toml = r#"
    /// [llm]
    /// deployment = "gpt-4o"
    /// "#;
    /// let config = SentryConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.llm.deployment.as_deref(), Some("gpt-4o"));
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, SentryError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay the process environment onto this configuration.
    pub fn with_process_env(self) -> Result<Self, SentryError> {
        self.with_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup` (an environment accessor) onto this configuration.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`SentryError::Config`] if the temperature is not a number.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffsentry_core::SentryConfig;
    ///
    /// let config = SentryConfig::default()
    ///     .with_env(|key| (key == "AZURE_OPENAI_TEMPERATURE").then(|| "0.2".to_string()))
    ///     .unwrap();
    /// assert_eq!(config.llm.temperature, 0.2);
    /// ```
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, SentryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ENDPOINT) {
            self.llm.endpoint = Some(v);
        }
        if let Some(v) = get(ENV_API_KEY) {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get(ENV_API_VERSION) {
            self.llm.api_version = Some(v);
        }
        if let Some(v) = get(ENV_DEPLOYMENT) {
            self.llm.deployment = Some(v);
        }
        if let Some(v) = get(ENV_TEMPERATURE) {
            self.llm.temperature = v.trim().parse().map_err(|_| {
                SentryError::Config(format!("{ENV_TEMPERATURE} must be a number, got '{v}'"))
            })?;
        }
        if let Some(v) = get(ENV_ALT_API_KEY) {
            self.llm.alt_api_key = Some(v);
        }
        Ok(self)
    }
}

/// Azure OpenAI chat settings.
///
/// # Examples
///
/// ```
/// use diffsentry_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert!(config.validate().is_err());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: Option<String>,
    /// API key.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// `api-version` query parameter.
    pub api_version: Option<String>,
    /// Chat deployment name.
    pub deployment: Option<String>,
    /// Sampling temperature (default: 0.5).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Whether the backend accepts tool definitions (default: true).
    #[serde(default = "default_tools")]
    pub tools: bool,
    /// Per-request timeout in seconds (default: 120).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Alternate provider key. Not used for requests.
    #[serde(default, skip_serializing)]
    pub alt_api_key: Option<String>,
}

fn default_temperature() -> f32 {
    0.5
}

fn default_tools() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: None,
            deployment: None,
            temperature: default_temperature(),
            tools: default_tools(),
            timeout_secs: default_timeout_secs(),
            alt_api_key: None,
        }
    }
}

// Keys stay out of debug output and therefore out of logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .field("deployment", &self.deployment)
            .field("temperature", &self.temperature)
            .field("tools", &self.tools)
            .field("timeout_secs", &self.timeout_secs)
            .field("alt_api_key", &self.alt_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl LlmConfig {
    /// Check that every required setting is present.
    ///
    /// # Errors
    ///
    /// Returns a single [`SentryError::Config`] naming every missing variable.
    pub fn validate(&self) -> Result<(), SentryError> {
        let missing: Vec<&str> = [
            (ENV_ENDPOINT, &self.endpoint),
            (ENV_API_KEY, &self.api_key),
            (ENV_API_VERSION, &self.api_version),
            (ENV_DEPLOYMENT, &self.deployment),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(SentryError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(SentryError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        Ok(())
    }

    /// Full chat-completions URL for the configured deployment.
    ///
    /// # Errors
    ///
    /// Returns [`SentryError::Config`] if required settings are missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffsentry_core::LlmConfig;
    ///
    /// let config = LlmConfig {
    ///     endpoint: Some("https://res.openai.azure.com/".into()),
    ///     api_key: Some("k".into()),
    ///     api_version: Some("2024-02-01".into()),
    ///     deployment: Some("gpt-4o".into()),
    ///     ..LlmConfig::default()
    /// };
    /// assert_eq!(
    ///     config.chat_completions_url().unwrap(),
    ///     "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01"
    /// );
    /// ```
    pub fn chat_completions_url(&self) -> Result<String, SentryError> {
        self.validate()?;
        let endpoint = self.endpoint.as_deref().unwrap_or_default();
        let deployment = self.deployment.as_deref().unwrap_or_default();
        let version = self.api_version.as_deref().unwrap_or_default();
        Ok(format!(
            "{}/openai/deployments/{deployment}/chat/completions?api-version={version}",
            endpoint.trim_end_matches('/')
        ))
    }
}

/// Repository settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Repository inspected by `audit_now` and `commit_message` (default: `.`).
    #[serde(default = "default_repo_path")]
    pub path: PathBuf,
}

fn default_repo_path() -> PathBuf {
    PathBuf::from(".")
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            path: default_repo_path(),
        }
    }
}
