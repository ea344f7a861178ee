//! Finding records and position-keyed deduplication.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::ssa::Position;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Minor security concern.
    Low,
    /// Potential security risk.
    Medium,
    /// Significant security risk.
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

/// How certain the analyzer is about a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    /// Heuristic match.
    Low,
    /// Likely real, some approximation involved.
    Medium,
    /// Direct evidence in the value graph.
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "LOW"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::High => write!(f, "HIGH"),
        }
    }
}

/// A security finding anchored at a source position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Rule that produced the finding, e.g. `G704`.
    pub rule_id: String,
    /// Source file.
    pub file: PathBuf,
    /// 1-based line of the offending call.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
    /// Human-readable description of what was found.
    pub what: String,
    /// Severity from the rule.
    pub severity: Severity,
    /// Confidence from the rule.
    pub confidence: Confidence,
    /// Source line excerpt; empty when the file cannot be read.
    pub code: String,
}

impl Issue {
    /// Builds an issue at `pos`, rendering a best-effort snippet.
    #[must_use]
    pub fn new(
        rule_id: &str,
        what: &str,
        severity: Severity,
        confidence: Confidence,
        pos: &Position,
    ) -> Self {
        Self {
            rule_id: rule_id.to_owned(),
            file: PathBuf::from(&pos.file),
            line: pos.line,
            column: pos.column,
            what: what.to_owned(),
            severity,
            confidence,
            code: code_snippet(&pos.file, pos.line),
        }
    }
}

/// Reads the offending source line. Any I/O problem degrades to an empty
/// snippet, never an error.
fn code_snippet(file: &str, line: usize) -> String {
    let Ok(content) = fs::read_to_string(file) else {
        return String::new();
    };
    content
        .lines()
        .nth(line.saturating_sub(1))
        .map(|l| l.trim_end().to_owned())
        .unwrap_or_default()
}

/// Append-only finding set, deduplicated by `(file, line, column)` so each
/// position reports at most once per rule run.
#[derive(Debug, Default)]
pub struct IssueSet {
    by_pos: FxHashMap<(PathBuf, usize, usize), Issue>,
}

impl IssueSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an issue unless its position already reported.
    pub fn insert(&mut self, issue: Issue) {
        self.by_pos
            .entry((issue.file.clone(), issue.line, issue.column))
            .or_insert(issue);
    }

    /// Merges another set, keeping the first issue per position.
    pub fn merge(&mut self, other: IssueSet) {
        for (key, issue) in other.by_pos {
            self.by_pos.entry(key).or_insert(issue);
        }
    }

    /// Whether no issue was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_pos.is_empty()
    }

    /// Drains into a list ordered by position, which keeps analyzer output
    /// deterministic across parallel runs.
    #[must_use]
    pub fn into_sorted_vec(self) -> Vec<Issue> {
        let mut issues: Vec<Issue> = self.by_pos.into_values().collect();
        issues.sort_by(|a, b| {
            (&a.file, a.line, a.column, &a.rule_id).cmp(&(&b.file, b.line, b.column, &b.rule_id))
        });
        issues
    }
}
