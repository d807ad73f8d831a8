//! Local functions the model can call, and last-write-wins resolution of
//! a completion's tool calls.

use std::collections::BTreeMap;

use diffsentry_core::{RiskScore, SentryError};

use crate::llm::{ToolCall, ToolSpec};

/// Name of the scoring tool declared to the model.
pub const ALERT_TOOL: &str = "git_alert";

/// A function the model may invoke by name.
pub trait Tool: Send + Sync {
    /// Declaration sent to the model.
    fn spec(&self) -> ToolSpec;

    /// Run the tool with decoded `arguments` and return its output.
    fn invoke(&self, arguments: &serde_json::Value) -> Result<serde_json::Value, SentryError>;
}

/// Tools keyed by name.
///
/// # Examples
///
/// ```
/// use diffsentry_review::tools::{ToolRegistry, ALERT_TOOL};
///
/// let registry = ToolRegistry::with_defaults();
/// assert!(registry.get(ALERT_TOOL).is_some());
/// assert_eq!(registry.specs().len(), 1);
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the scoring tool.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(AlertTool);
        registry
    }

    /// Add `tool`, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.spec().name;
        self.tools.insert(name, Box::new(tool));
    }

    /// Look a tool up by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| &**t)
    }

    /// Declarations of every registered tool.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }
}

/// Execute every call in order and keep the output of the last one.
///
/// Earlier calls still run (and log), but their outputs are dropped.
/// Returns `None` when there are no calls.
///
/// # Errors
///
/// Returns [`SentryError::Tool`] when a call names an unregistered tool, or
/// whatever error the tool itself returns.
pub fn run_tool_calls(
    registry: &ToolRegistry,
    calls: &[ToolCall],
) -> Result<Option<serde_json::Value>, SentryError> {
    let mut output = None;
    for call in calls {
        let tool = registry
            .get(&call.name)
            .ok_or_else(|| SentryError::Tool(format!("unknown tool '{}'", call.name)))?;
        let result = tool.invoke(&call.arguments)?;
        log::info!("Tool: '{}'", call.name);
        output = Some(result);
    }
    Ok(output)
}

/// Reports the audit score and echoes it back unchanged.
pub struct AlertTool;

impl Tool for AlertTool {
    fn spec(&self) -> ToolSpec {
        let levels: Vec<&str> = RiskScore::ALL.iter().map(|s| s.name()).collect();
        ToolSpec {
            name: ALERT_TOOL.into(),
            description: "Raise an alert for the global risk score of an audited git diff. \
                          Call it once with the score stated in the audit."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "enum": levels,
                        "description": "Global score of risks found by the audit."
                    }
                },
                "required": ["status"]
            }),
        }
    }

    fn invoke(&self, arguments: &serde_json::Value) -> Result<serde_json::Value, SentryError> {
        let status = arguments
            .get("status")
            .ok_or_else(|| SentryError::Tool(format!("{ALERT_TOOL}: missing 'status' argument")))?;
        let score = score_from_value(status)?;
        log::info!("Audit score: {score}");
        Ok(status.clone())
    }
}

/// Interpret a tool output as a [`RiskScore`].
///
/// Accepts level names (any case) and numeric ranks 1 through 5.
///
/// # Examples
///
/// ```
/// use diffsentry_core::RiskScore;
/// use diffsentry_review::tools::score_from_value;
///
/// assert_eq!(score_from_value(&serde_json::json!("HIGH")).unwrap(), RiskScore::High);
/// assert_eq!(score_from_value(&serde_json::json!(5)).unwrap(), RiskScore::Critical);
/// ```
pub fn score_from_value(value: &serde_json::Value) -> Result<RiskScore, SentryError> {
    match value {
        serde_json::Value::String(s) => s.parse().map_err(SentryError::Tool),
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(RiskScore::from_rank)
            .ok_or_else(|| SentryError::Tool(format!("unknown risk rank: {n}"))),
        other => Err(SentryError::Tool(format!("unexpected score value: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    struct Echo {
        name: &'static str,
        output: serde_json::Value,
        seen: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    impl Tool for Echo {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: self.name.into(),
                description: String::new(),
                parameters: serde_json::json!({"type": "object"}),
            }
        }

        fn invoke(&self, arguments: &serde_json::Value) -> Result<serde_json::Value, SentryError> {
            self.seen.lock().unwrap().push(arguments.clone());
            Ok(self.output.clone())
        }
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn last_tool_output_wins() {
        let seen_1 = Arc::new(Mutex::new(Vec::new()));
        let seen_2 = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        registry.register(Echo {
            name: "test_tool_1",
            output: serde_json::json!("Test tool output 1"),
            seen: seen_1.clone(),
        });
        registry.register(Echo {
            name: "test_tool_2",
            output: serde_json::json!("Test tool output 2"),
            seen: seen_2.clone(),
        });

        let calls = [
            call("test_tool_1", serde_json::json!({"arg": 1})),
            call("test_tool_2", serde_json::json!({"arg": 2})),
        ];
        let output = run_tool_calls(&registry, &calls).unwrap();

        assert_eq!(output, Some(serde_json::json!("Test tool output 2")));
        assert_eq!(*seen_1.lock().unwrap(), vec![serde_json::json!({"arg": 1})]);
        assert_eq!(*seen_2.lock().unwrap(), vec![serde_json::json!({"arg": 2})]);
    }

    #[test]
    fn single_call_output_is_returned() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        registry.register(Echo {
            name: "test_tool",
            output: serde_json::json!("Test tool output"),
            seen: seen.clone(),
        });

        let output = run_tool_calls(&registry, &[call("test_tool", serde_json::json!("x"))]).unwrap();
        assert_eq!(output, Some(serde_json::json!("Test tool output")));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn no_calls_gives_none() {
        let registry = ToolRegistry::with_defaults();
        assert_eq!(run_tool_calls(&registry, &[]).unwrap(), None);
    }

    #[test]
    fn unknown_tool_is_error() {
        let registry = ToolRegistry::with_defaults();
        let err = run_tool_calls(&registry, &[call("rm_rf", serde_json::json!({}))]).unwrap_err();
        assert!(matches!(err, SentryError::Tool(_)));
        assert!(err.to_string().contains("rm_rf"));
    }

    #[test]
    fn alert_tool_echoes_status() {
        let output = AlertTool
            .invoke(&serde_json::json!({"status": "CRITICAL"}))
            .unwrap();
        assert_eq!(output, serde_json::json!("CRITICAL"));
    }

    #[test]
    fn alert_tool_rejects_unknown_level() {
        assert!(AlertTool
            .invoke(&serde_json::json!({"status": "APOCALYPTIC"}))
            .is_err());
        assert!(AlertTool.invoke(&serde_json::json!({})).is_err());
    }

    #[test]
    fn alert_spec_lists_every_level() {
        let spec = AlertTool.spec();
        assert_eq!(spec.name, ALERT_TOOL);
        let levels = &spec.parameters["properties"]["status"]["enum"];
        assert_eq!(
            levels,
            &serde_json::json!(["NONE", "LOW", "MEDIUM", "HIGH", "CRITICAL"])
        );
    }

    #[test]
    fn score_from_value_accepts_names_and_ranks() {
        assert_eq!(
            score_from_value(&serde_json::json!("medium")).unwrap(),
            RiskScore::Medium
        );
        assert_eq!(score_from_value(&serde_json::json!(1)).unwrap(), RiskScore::None);
        assert!(score_from_value(&serde_json::json!(9)).is_err());
        assert!(score_from_value(&serde_json::json!(null)).is_err());
    }
}
