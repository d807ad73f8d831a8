use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// How a single file changed between the two sides of a comparison.
///
/// # Examples
///
/// ```
/// use diffsentry_core::FileStatus;
///
/// assert_eq!(FileStatus::Created.to_string(), "created");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// The file did not exist on the old side.
    Created,
    /// The file does not exist on the new side.
    Deleted,
    /// The file is a copy of another tracked file.
    Copied,
    /// Anything else, renames included.
    Modified,
}

impl FileStatus {
    /// Classify a change from the three flags a diff delta exposes.
    ///
    /// Priority order: new > deleted > copied > modified. Every combination
    /// of flags maps to exactly one status.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffsentry_core::FileStatus;
    ///
    /// assert_eq!(FileStatus::classify(true, true, true), FileStatus::Created);
    /// assert_eq!(FileStatus::classify(false, false, true), FileStatus::Copied);
    /// assert_eq!(FileStatus::classify(false, false, false), FileStatus::Modified);
    /// ```
    pub fn classify(is_new: bool, is_deleted: bool, is_copied: bool) -> Self {
        if is_new {
            FileStatus::Created
        } else if is_deleted {
            FileStatus::Deleted
        } else if is_copied {
            FileStatus::Copied
        } else {
            FileStatus::Modified
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Created => write!(f, "created"),
            FileStatus::Deleted => write!(f, "deleted"),
            FileStatus::Copied => write!(f, "copied"),
            FileStatus::Modified => write!(f, "modified"),
        }
    }
}

/// One file's change within a comparison.
///
/// # Examples
///
/// ```
/// use diffsentry_core::{FileDiff, FileStatus};
/// use std::path::PathBuf;
///
/// let record = FileDiff {
///     diff: "+fn main() {}".into(),
///     path: PathBuf::from("src/main.rs"),
///     status: FileStatus::Created,
/// };
/// assert_eq!(record.status, FileStatus::Created);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    /// Raw unified patch for this file.
    pub diff: String,
    /// New path for created files, old path otherwise.
    pub path: PathBuf,
    /// Classified change status.
    pub status: FileStatus,
}

/// The full changeset under review.
///
/// Built once per invocation from repository output and only read afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSet {
    /// Author name of the reference commit.
    pub author: String,
    /// Author email of the reference commit.
    pub email: String,
    /// Commit time of the reference commit, with its original offset.
    pub date: DateTime<FixedOffset>,
    /// Per-file records in diff order.
    pub diffs: Vec<FileDiff>,
}

impl DiffSet {
    /// Number of changed files.
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    /// Returns `true` when no file changed.
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }
}

/// Ordered severity classification of an audited change.
///
/// Ranks run from `None` (1) to `Critical` (5). Parsing accepts the
/// level names in any case as well as the numeric ranks.
///
/// # Examples
///
/// ```
/// use diffsentry_core::RiskScore;
///
/// let score: RiskScore = "high".parse().unwrap();
/// assert!(score > RiskScore::Medium);
/// assert_eq!("5".parse::<RiskScore>().unwrap(), RiskScore::MAX);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskScore {
    /// No risk found.
    None = 1,
    /// Minor issues.
    Low = 2,
    /// Issues worth addressing.
    Medium = 3,
    /// Serious issues.
    High = 4,
    /// Must not ship as is.
    Critical = 5,
}

impl RiskScore {
    /// Highest severity level.
    pub const MAX: RiskScore = RiskScore::Critical;

    /// All levels in ascending order.
    pub const ALL: [RiskScore; 5] = [
        RiskScore::None,
        RiskScore::Low,
        RiskScore::Medium,
        RiskScore::High,
        RiskScore::Critical,
    ];

    /// Numeric rank, 1 through 5.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Look a level up by its numeric rank.
    pub fn from_rank(rank: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| u64::from(s.rank()) == rank)
    }

    /// Upper-case level name as used in prompts and tool schemas.
    pub fn name(self) -> &'static str {
        match self {
            RiskScore::None => "NONE",
            RiskScore::Low => "LOW",
            RiskScore::Medium => "MEDIUM",
            RiskScore::High => "HIGH",
            RiskScore::Critical => "CRITICAL",
        }
    }

    /// Returns `true` for the maximum severity level.
    pub fn is_critical(self) -> bool {
        self == Self::MAX
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RiskScore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(rank) = trimmed.parse::<u64>() {
            return Self::from_rank(rank).ok_or_else(|| format!("unknown risk rank: {rank}"));
        }
        // Scores sometimes come back qualified, e.g. "Score.HIGH".
        let name = trimmed.rsplit('.').next().unwrap_or(trimmed);
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("unknown risk score: {trimmed}"))
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use diffsentry_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown rendered for the terminal.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// The model's Markdown, unrendered.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
