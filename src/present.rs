//! Terminal output for audits and commit messages.

use std::io::{self, Write};

use diffsentry_core::{DiffSet, FileStatus, OutputFormat, RiskScore};
use diffsentry_review::pipeline::AuditReport;
use serde::Serialize;

use crate::markdown;

pub const CRITICAL_WARNING: &str =
    "WARNING: critical issues detected. Do not merge this change as is.";
pub const NO_CRITICAL: &str = "No critical issues detected.";
pub const SCORE_UNAVAILABLE: &str = "Risk score unavailable.";
pub const AUDIT_FAILED: &str = "Audit failed: the model invocation did not return a report.";
pub const MESSAGE_FAILED: &str =
    "No commit message generated: the model invocation did not return a result.";
pub const NO_CHANGES: &str = "No changes to review.";

const RED_BOLD: &str = "\x1b[1;31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Writes command results in the selected format.
pub struct Presenter {
    format: OutputFormat,
    use_color: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    path: String,
    status: FileStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditDocument<'a> {
    author: &'a str,
    email: &'a str,
    date: String,
    files: Vec<FileEntry>,
    score: Option<RiskScore>,
    critical: bool,
    report: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageDocument<'a> {
    author: &'a str,
    email: &'a str,
    date: String,
    files: Vec<FileEntry>,
    message: Option<&'a str>,
}

impl Presenter {
    pub fn new(format: OutputFormat, use_color: bool) -> Self {
        Self { format, use_color }
    }

    /// Author and date of the changeset.
    pub fn header(&self, out: &mut impl Write, diffs: &DiffSet) -> io::Result<()> {
        writeln!(out, "Author: {} <{}>", diffs.author, diffs.email)?;
        writeln!(out, "Date:   {}", diffs.date.format("%Y-%m-%d %H:%M:%S %:z"))?;
        writeln!(out)
    }

    /// One `[status] path` line per changed file, in diff order.
    pub fn affected_files(&self, out: &mut impl Write, diffs: &DiffSet) -> io::Result<()> {
        for record in &diffs.diffs {
            writeln!(out, "[{}] {}", record.status, record.path.display())?;
        }
        Ok(())
    }

    pub fn no_changes(&self, out: &mut impl Write) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            return writeln!(out, "{}", serde_json::json!({ "files": [] }));
        }
        writeln!(out, "{NO_CHANGES}")
    }

    /// Full audit output: header, files, report body and the final verdict line.
    ///
    /// `report` is `None` when the model invocation failed.
    pub fn audit(
        &self,
        out: &mut impl Write,
        diffs: &DiffSet,
        report: Option<&AuditReport>,
    ) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            let doc = AuditDocument {
                author: &diffs.author,
                email: &diffs.email,
                date: diffs.date.to_rfc3339(),
                files: file_entries(diffs),
                score: report.and_then(|r| r.score),
                critical: report.is_some_and(AuditReport::is_critical),
                report: report.map(|r| r.text.as_str()),
            };
            return write_json(out, &doc);
        }

        self.header(out, diffs)?;
        self.affected_files(out, diffs)?;
        writeln!(out)?;

        let Some(report) = report else {
            return self.line(out, YELLOW, AUDIT_FAILED);
        };

        match self.format {
            OutputFormat::Markdown => writeln!(out, "{}", report.text.trim_end())?,
            _ => write!(out, "{}", markdown::render(&report.text, self.use_color))?,
        }
        writeln!(out)?;

        match report.score {
            Some(score) => {
                writeln!(out, "Risk score: {score}")?;
                if score.is_critical() {
                    self.line(out, RED_BOLD, CRITICAL_WARNING)
                } else {
                    self.line(out, GREEN, NO_CRITICAL)
                }
            }
            None => self.line(out, YELLOW, SCORE_UNAVAILABLE),
        }
    }

    /// Commit message output. `message` is `None` when the model invocation failed.
    ///
    /// In text and Markdown formats only the message reaches `out`; the file
    /// listing and the failure notice go to `notes`, so the output can feed
    /// `git commit -m` directly.
    pub fn commit_message(
        &self,
        out: &mut impl Write,
        notes: &mut impl Write,
        diffs: &DiffSet,
        message: Option<&str>,
    ) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            let doc = MessageDocument {
                author: &diffs.author,
                email: &diffs.email,
                date: diffs.date.to_rfc3339(),
                files: file_entries(diffs),
                message,
            };
            return write_json(out, &doc);
        }

        self.affected_files(notes, diffs)?;
        writeln!(notes)?;
        match message {
            Some(message) => writeln!(out, "{message}"),
            None => self.line(notes, YELLOW, MESSAGE_FAILED),
        }
    }

    fn line(&self, out: &mut impl Write, color: &str, text: &str) -> io::Result<()> {
        if self.use_color {
            writeln!(out, "{color}{text}{RESET}")
        } else {
            writeln!(out, "{text}")
        }
    }
}

fn file_entries(diffs: &DiffSet) -> Vec<FileEntry> {
    diffs
        .diffs
        .iter()
        .map(|d| FileEntry {
            path: d.path.display().to_string(),
            status: d.status,
        })
        .collect()
}

fn write_json(out: &mut impl Write, value: &impl Serialize) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(out, "{json}")
}
