use diffsentry_core::DiffSet;

use crate::llm::ChatMessage;

const COMMIT_MESSAGE_PROMPT: &str = "\
You write git commit messages.
The user sends the full diff of a change and you reply with its commit message.
The message must fit on one single line. Be concise: reply with the message only, \
no explanation, no quotes, no code fences.";

const CODE_AUDIT_PROMPT: &str = "\
You are an experienced developer performing a code review of a git diff.
Identify potential errors, suggest improvements, and point out best practices \
the code follows or misses.

If you detect any issue, give a global score of the risks using this scale:
- NONE: 0.0
- LOW: between 0.1 and 3.9
- MEDIUM: between 4.0 and 6.9
- HIGH: between 7.0 and 8.9
- CRITICAL: between 9.0 and 10.0

Answer with this template:
### Score
Global score of risks: [NONE, LOW, MEDIUM, HIGH, CRITICAL]

### Diff Explanation
First a single-line summary of the diff, without commentary.
Then a detailed explanation of the changes it makes.

### Audit summary
A detailed explanation of the gaps you found and their potential impact, \
if there are any significant findings.";

/// Which fixed instruction wraps the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Code review report with a risk score.
    Audit,
    /// Single-line commit message.
    CommitMessage,
}

impl PromptKind {
    /// The system instruction for this kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffsentry_review::prompt::PromptKind;
    ///
    /// assert!(PromptKind::Audit.system_prompt().contains("### Score"));
    /// assert!(PromptKind::CommitMessage.system_prompt().contains("one single line"));
    /// ```
    pub fn system_prompt(self) -> &'static str {
        match self {
            PromptKind::Audit => CODE_AUDIT_PROMPT,
            PromptKind::CommitMessage => COMMIT_MESSAGE_PROMPT,
        }
    }
}

/// Join every record's diff text with newlines, in order.
///
/// Nothing is truncated or chunked.
pub fn diff_body(diffs: &DiffSet) -> String {
    diffs
        .diffs
        .iter()
        .map(|d| d.diff.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `[system, user]` messages for `kind` over `diffs`.
pub fn messages(kind: PromptKind, diffs: &DiffSet) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(kind.system_prompt()),
        ChatMessage::user(diff_body(diffs)),
    ]
}

/// The single user message asking the model to score an audit via the tool.
pub fn classification_messages(audit_text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(audit_text)]
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::DateTime;
    use diffsentry_core::{FileDiff, FileStatus};

    use super::*;
    use crate::llm::Role;

    fn set(texts: &[&str]) -> DiffSet {
        DiffSet {
            author: "alice".into(),
            email: "alice@example.com".into(),
            date: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
            diffs: texts
                .iter()
                .enumerate()
                .map(|(i, t)| FileDiff {
                    diff: t.to_string(),
                    path: PathBuf::from(format!("f{i}.txt")),
                    status: FileStatus::Modified,
                })
                .collect(),
        }
    }

    #[test]
    fn body_joins_with_single_newlines_in_order() {
        let body = diff_body(&set(&["first", "second\n", "third"]));
        assert_eq!(body, "first\nsecond\n\nthird");
    }

    #[test]
    fn body_of_single_record_is_verbatim() {
        assert_eq!(diff_body(&set(&["+only"])), "+only");
    }

    #[test]
    fn body_of_empty_set_is_empty() {
        assert_eq!(diff_body(&set(&[])), "");
    }

    #[test]
    fn messages_pair_system_and_user() {
        let msgs = messages(PromptKind::CommitMessage, &set(&["a", "b"]));
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[0].content, PromptKind::CommitMessage.system_prompt());
        assert_eq!(msgs[1].role, Role::User);
        assert_eq!(msgs[1].content, "a\nb");
    }

    #[test]
    fn audit_prompt_lists_every_level() {
        let prompt = PromptKind::Audit.system_prompt();
        for level in ["NONE", "LOW", "MEDIUM", "HIGH", "CRITICAL"] {
            assert!(prompt.contains(level), "missing {level}");
        }
        assert!(prompt.contains("### Audit summary"));
    }

    #[test]
    fn classification_is_single_user_message() {
        let msgs = classification_messages("### Score\nHIGH");
        assert_eq!(msgs, vec![ChatMessage::user("### Score\nHIGH")]);
    }
}
