use diffsentry_core::{DiffSet, RiskScore, SentryError};
use serde::Serialize;

use crate::llm::{ChatModel, ToolSpec};
use crate::prompt::{self, PromptKind};
use crate::tools::{self, ToolRegistry};

/// Result of a completed audit.
///
/// # Examples
///
/// ```
/// use diffsentry_core::RiskScore;
/// use diffsentry_review::pipeline::AuditReport;
///
/// let report = AuditReport {
///     score: Some(RiskScore::Low),
///     text: "### Score\nLOW".into(),
/// };
/// assert!(!report.is_critical());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Score from the classification step; `None` when it was skipped or failed.
    pub score: Option<RiskScore>,
    /// The model's audit, Markdown.
    pub text: String,
}

impl AuditReport {
    /// Returns `true` when the score is the maximum severity.
    pub fn is_critical(&self) -> bool {
        self.score.is_some_and(RiskScore::is_critical)
    }
}

/// Drives the diff → prompt → model → (score) sequence.
///
/// Tool-calling capability is read from the model once, here.
pub struct ReviewPipeline<M> {
    model: M,
    tools: ToolRegistry,
    tool_specs: Vec<ToolSpec>,
}

impl<M: ChatModel> ReviewPipeline<M> {
    /// Create a pipeline over `model` with the given tool registry.
    pub fn new(model: M, tools: ToolRegistry) -> Self {
        let tool_specs = if model.supports_tools() {
            tools.specs()
        } else {
            log::info!(
                "model {} does not support tool calling; risk scoring disabled",
                model.name()
            );
            Vec::new()
        };
        Self {
            model,
            tools,
            tool_specs,
        }
    }

    /// Whether the classification step will run.
    pub fn scores_audits(&self) -> bool {
        !self.tool_specs.is_empty()
    }

    /// Ask the model for a single-line commit message.
    ///
    /// # Errors
    ///
    /// Returns [`SentryError::Llm`] if the model call fails.
    pub async fn request_commit_message(&self, diffs: &DiffSet) -> Result<String, SentryError> {
        let messages = prompt::messages(PromptKind::CommitMessage, diffs);
        let completion = self.model.complete(&messages, &[]).await?;
        Ok(completion.text().trim().to_string())
    }

    /// Commit message, or `None` after logging the failure.
    pub async fn generate_commit_message(&self, diffs: &DiffSet) -> Option<String> {
        match self.request_commit_message(diffs).await {
            Ok(message) => Some(message),
            Err(e) => {
                log::error!("Error during commit message generation: {e}");
                None
            }
        }
    }

    /// Audit the diff, then classify the audit into a score.
    ///
    /// A failed classification keeps the audit text and leaves the score empty.
    ///
    /// # Errors
    ///
    /// Returns [`SentryError::Llm`] if the audit call itself fails.
    pub async fn request_audit(&self, diffs: &DiffSet) -> Result<AuditReport, SentryError> {
        let messages = prompt::messages(PromptKind::Audit, diffs);
        let completion = self.model.complete(&messages, &[]).await?;
        let text = completion.text().to_string();

        let score = match self.classify(&text).await {
            Ok(score) => score,
            Err(e) => {
                log::warn!("risk classification failed: {e}");
                None
            }
        };
        Ok(AuditReport { score, text })
    }

    /// Audit report, or `None` after logging the failure.
    pub async fn audit_diff(&self, diffs: &DiffSet) -> Option<AuditReport> {
        match self.request_audit(diffs).await {
            Ok(report) => Some(report),
            Err(e) => {
                log::error!("Error during audit: {e}");
                None
            }
        }
    }

    /// Second round-trip: let the model call the scoring tool on `audit_text`.
    ///
    /// Returns `Ok(None)` without calling the model when tools are unsupported,
    /// and `Ok(None)` when the model answered without calling a tool. With
    /// several tool calls, the last one's output is the score.
    ///
    /// # Errors
    ///
    /// Returns the model error, or [`SentryError::Tool`] if a call cannot be
    /// executed or its output is not a score.
    pub async fn classify(&self, audit_text: &str) -> Result<Option<RiskScore>, SentryError> {
        if !self.scores_audits() {
            return Ok(None);
        }
        let messages = prompt::classification_messages(audit_text);
        let completion = self.model.complete(&messages, &self.tool_specs).await?;
        if completion.tool_calls.is_empty() {
            log::debug!("model answered without calling a tool");
        }
        tools::run_tool_calls(&self.tools, &completion.tool_calls)?
            .map(|output| tools::score_from_value(&output))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;
    use diffsentry_core::{FileDiff, FileStatus};

    use super::*;
    use crate::llm::{ChatMessage, Completion, Role, ToolCall};
    use crate::tools::ALERT_TOOL;

    /// Replays canned completions and records every request.
    struct ScriptedModel {
        tools: bool,
        replies: Mutex<VecDeque<Result<Completion, SentryError>>>,
        requests: Mutex<Vec<(Vec<ChatMessage>, usize)>>,
    }

    impl ScriptedModel {
        fn new(tools: bool, replies: Vec<Result<Completion, SentryError>>) -> Self {
            Self {
                tools,
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        fn supports_tools(&self) -> bool {
            self.tools
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
            tools: &[ToolSpec],
        ) -> Result<Completion, SentryError> {
            self.requests
                .lock()
                .unwrap()
                .push((messages.to_vec(), tools.len()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SentryError::Llm("no scripted reply left".into())))
        }
    }

    fn text(content: &str) -> Result<Completion, SentryError> {
        Ok(Completion {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        })
    }

    fn alerts(levels: &[&str]) -> Result<Completion, SentryError> {
        Ok(Completion {
            content: None,
            tool_calls: levels
                .iter()
                .map(|level| ToolCall {
                    id: None,
                    name: ALERT_TOOL.into(),
                    arguments: serde_json::json!({ "status": level }),
                })
                .collect(),
        })
    }

    fn diff_set() -> DiffSet {
        DiffSet {
            author: "alice".into(),
            email: "alice@example.com".into(),
            date: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
            diffs: vec![
                FileDiff {
                    diff: "+a".into(),
                    path: PathBuf::from("a.txt"),
                    status: FileStatus::Created,
                },
                FileDiff {
                    diff: "-b\n+b2".into(),
                    path: PathBuf::from("b.txt"),
                    status: FileStatus::Modified,
                },
            ],
        }
    }

    fn pipeline(model: ScriptedModel) -> ReviewPipeline<ScriptedModel> {
        ReviewPipeline::new(model, ToolRegistry::with_defaults())
    }

    #[tokio::test]
    async fn commit_message_is_trimmed_text() {
        let p = pipeline(ScriptedModel::new(true, vec![text("  Add b2 to b.txt\n")]));
        let message = p.generate_commit_message(&diff_set()).await;
        assert_eq!(message.as_deref(), Some("Add b2 to b.txt"));

        let requests = p.model.requests.lock().unwrap();
        let (messages, tool_count) = &requests[0];
        assert_eq!(messages[0].content, PromptKind::CommitMessage.system_prompt());
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "+a\n-b\n+b2");
        assert_eq!(*tool_count, 0);
    }

    #[tokio::test]
    async fn commit_message_failure_yields_none() {
        let p = pipeline(ScriptedModel::new(
            true,
            vec![Err(SentryError::Llm("connection refused".into()))],
        ));
        assert_eq!(p.generate_commit_message(&diff_set()).await, None);
        assert!(p.request_commit_message(&diff_set()).await.is_err());
    }

    #[tokio::test]
    async fn audit_scores_with_tool_call() {
        let p = pipeline(ScriptedModel::new(
            true,
            vec![text("### Score\nGlobal score of risks: HIGH"), alerts(&["HIGH"])],
        ));
        let report = p.audit_diff(&diff_set()).await.unwrap();
        assert_eq!(report.score, Some(RiskScore::High));
        assert_eq!(report.text, "### Score\nGlobal score of risks: HIGH");

        let requests = p.model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].0[0].content, PromptKind::Audit.system_prompt());
        assert_eq!(requests[0].1, 0);
        assert_eq!(
            requests[1].0,
            vec![ChatMessage::user("### Score\nGlobal score of risks: HIGH")]
        );
        assert_eq!(requests[1].1, 1);
    }

    #[tokio::test]
    async fn last_tool_call_decides_score() {
        let p = pipeline(ScriptedModel::new(
            true,
            vec![text("audit"), alerts(&["LOW", "CRITICAL"])],
        ));
        let report = p.audit_diff(&diff_set()).await.unwrap();
        assert_eq!(report.score, Some(RiskScore::Critical));
        assert!(report.is_critical());

        let p = pipeline(ScriptedModel::new(
            true,
            vec![text("audit"), alerts(&["CRITICAL", "LOW"])],
        ));
        let report = p.audit_diff(&diff_set()).await.unwrap();
        assert_eq!(report.score, Some(RiskScore::Low));
    }

    #[tokio::test]
    async fn no_tool_support_skips_scoring() {
        let p = pipeline(ScriptedModel::new(false, vec![text("audit text")]));
        assert!(!p.scores_audits());
        let report = p.audit_diff(&diff_set()).await.unwrap();
        assert_eq!(report.score, None);
        assert_eq!(report.text, "audit text");
        assert_eq!(p.model.request_count(), 1);
    }

    #[tokio::test]
    async fn answer_without_tool_call_has_no_score() {
        let p = pipeline(ScriptedModel::new(true, vec![text("audit"), text("It is HIGH.")]));
        let report = p.audit_diff(&diff_set()).await.unwrap();
        assert_eq!(report.score, None);
    }

    #[tokio::test]
    async fn classification_failure_keeps_audit_text() {
        let p = pipeline(ScriptedModel::new(
            true,
            vec![text("audit"), Err(SentryError::Llm("timeout".into()))],
        ));
        let report = p.audit_diff(&diff_set()).await.unwrap();
        assert_eq!(report.text, "audit");
        assert_eq!(report.score, None);
    }

    #[tokio::test]
    async fn audit_failure_yields_none() {
        let p = pipeline(ScriptedModel::new(
            true,
            vec![Err(SentryError::Llm("401 Unauthorized".into()))],
        ));
        assert_eq!(p.audit_diff(&diff_set()).await, None);
        assert_eq!(p.model.request_count(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_call_is_classification_error() {
        let p = pipeline(ScriptedModel::new(
            true,
            vec![Ok(Completion {
                content: None,
                tool_calls: vec![ToolCall {
                    id: None,
                    name: "delete_repo".into(),
                    arguments: serde_json::json!({}),
                }],
            })],
        ));
        let err = p.classify("audit").await.unwrap_err();
        assert!(matches!(err, SentryError::Tool(_)));
    }
}
