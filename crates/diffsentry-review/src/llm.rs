use std::time::Duration;

use async_trait::async_trait;
use diffsentry_core::{LlmConfig, SentryError};
use serde::{Deserialize, Serialize};

/// A message in a chat conversation with the model.
///
/// # Examples
///
/// ```
/// use diffsentry_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Review this code");
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    /// A system-role instruction.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use diffsentry_review::llm::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// Declaration of a local function the model may call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    /// Function name the model refers to.
    pub name: String,
    /// What the function does, shown to the model.
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    /// OpenAI `tools` array entry for this function.
    pub fn to_openai(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// A structured request from the model to invoke a named tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Call id assigned by the model, if any.
    pub id: Option<String>,
    /// Name of the tool to invoke.
    pub name: String,
    /// Decoded arguments object.
    pub arguments: serde_json::Value,
}

/// The assistant turn returned by a chat completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Text content, absent when the model only called tools.
    pub content: Option<String>,
    /// Tool calls in the order the model emitted them.
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    /// Text content, or an empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// A chat-completion backend.
///
/// Whether the backend accepts tool definitions is fixed when it is built;
/// callers check [`ChatModel::supports_tools`] once and never send tools
/// to a backend that reports `false`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model or deployment identifier, for logs.
    fn name(&self) -> &str;

    /// Whether `tools` passed to [`ChatModel::complete`] are honored.
    fn supports_tools(&self) -> bool;

    /// Send `messages` (and optional `tools`) and return the assistant turn.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<Completion, SentryError>;
}

/// Azure OpenAI chat completions client.
///
/// # Examples
///
/// ```
/// use diffsentry_core::LlmConfig;
/// use diffsentry_review::llm::{ChatModel, LlmClient};
///
/// let config = LlmConfig {
///     endpoint: Some("https://res.openai.azure.com".into()),
///     api_key: Some("test-key".into()),
///     api_version: Some("2024-02-01".into()),
///     deployment: Some("gpt-4o".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// assert_eq!(client.name(), "gpt-4o");
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
    url: String,
}

impl LlmClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SentryError::Config`] if required settings are missing, or
    /// [`SentryError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, SentryError> {
        let url = config.chat_completions_url()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SentryError::Llm(format!("failed to create HTTP client: {e}")))?;
        log::debug!(
            "model {} loaded (tools: {})",
            config.deployment.as_deref().unwrap_or_default(),
            config.tools
        );
        Ok(Self {
            client,
            config: config.clone(),
            url,
        })
    }

    /// Build the JSON request body.
    pub fn request_body(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": messages,
            "temperature": self.config.temperature,
        });
        if !tools.is_empty() && self.config.tools {
            body["tools"] = tools.iter().map(ToolSpec::to_openai).collect();
        }
        body
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    fn name(&self) -> &str {
        self.config.deployment.as_deref().unwrap_or_default()
    }

    fn supports_tools(&self) -> bool {
        self.config.tools
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<Completion, SentryError> {
        let body = self.request_body(messages, tools);
        log::debug!("POST {} ({} messages)", self.url, messages.len());

        let mut request = self.client.post(&self.url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("api-key", api_key);
        }
        request = request.header("Content-Type", "application/json");

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| SentryError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(SentryError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SentryError::Llm(format!("failed to parse response: {e}")))?;

        parse_completion(&response_body)
    }
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Option<serde_json::Value>,
}

/// Extract the first choice's assistant turn from a chat-completions response.
///
/// Tool-call arguments arrive as a JSON-encoded string and are decoded here.
///
/// # Errors
///
/// Returns [`SentryError::Llm`] if the response has no message or a tool
/// call carries arguments that are not valid JSON.
///
/// # Examples
///
/// ```
/// use diffsentry_review::llm::parse_completion;
///
/// let body = serde_json::json!({
///     "choices": [{ "message": { "role": "assistant", "content": "fix: typo" } }]
/// });
/// let completion = parse_completion(&body).unwrap();
/// assert_eq!(completion.text(), "fix: typo");
/// ```
pub fn parse_completion(body: &serde_json::Value) -> Result<Completion, SentryError> {
    let message = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| SentryError::Llm(format!("unexpected response structure: {body}")))?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(str::to_string);

    let raw_calls: Vec<ResponseToolCall> = match message.get("tool_calls") {
        Some(serde_json::Value::Null) | None => Vec::new(),
        Some(calls) => serde_json::from_value(calls.clone())
            .map_err(|e| SentryError::Llm(format!("malformed tool calls: {e}")))?,
    };

    let mut tool_calls = Vec::with_capacity(raw_calls.len());
    for call in raw_calls {
        let arguments = match call.function.arguments {
            Some(serde_json::Value::String(encoded)) if encoded.trim().is_empty() => {
                serde_json::Value::Object(Default::default())
            }
            Some(serde_json::Value::String(encoded)) => serde_json::from_str(&encoded)
                .map_err(|e| {
                    SentryError::Llm(format!(
                        "invalid arguments for tool '{}': {e}",
                        call.function.name
                    ))
                })?,
            Some(value) => value,
            None => serde_json::Value::Object(Default::default()),
        };
        tool_calls.push(ToolCall {
            id: call.id,
            name: call.function.name,
            arguments,
        });
    }

    Ok(Completion {
        content,
        tool_calls,
    })
}
