//! Declarative taint rule model.
//!
//! A rule pairs a `Config` (sources, sinks, sanitizers) with the `RuleInfo`
//! carried into every finding. Rule files are JSON arrays of rule objects;
//! malformed rules are rejected at load time.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::issue::{Confidence, Severity};

/// A declared taint source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Import path of the declaring package.
    pub package: String,
    /// Type name (for value sources) or function name (for call sources).
    pub name: String,
    /// Whether the tainted type is used behind a pointer.
    #[serde(default)]
    pub pointer: bool,
    /// Whether the source is a function whose results are tainted, rather
    /// than a named type.
    #[serde(default)]
    pub is_function: bool,
}

/// A declared sink: a call that must not receive tainted data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sink {
    /// Import path of the callee's package.
    pub package: String,
    /// Receiver type name for methods; empty for plain functions.
    #[serde(default)]
    pub receiver: String,
    /// Callee name.
    pub method: String,
    /// Whether the receiver is a pointer receiver.
    #[serde(default)]
    pub pointer: bool,
    /// When present, only these argument indices are inspected for taint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_args: Option<Vec<usize>>,
    /// Static type preconditions per argument index; an unsatisfied guard
    /// suppresses the finding.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arg_type_guards: BTreeMap<usize, String>,
}

/// A declared sanitizer: a call whose result is clean regardless of
/// argument taint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sanitizer {
    /// Import path of the callee's package.
    pub package: String,
    /// Receiver type name for methods; empty for plain functions.
    #[serde(default)]
    pub receiver: String,
    /// Callee name.
    pub method: String,
    /// Whether the receiver is a pointer receiver.
    #[serde(default)]
    pub pointer: bool,
}

/// Sources, sinks, and sanitizers for one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Where tainted data enters.
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Where tainted data causes harm.
    #[serde(default)]
    pub sinks: Vec<Sink>,
    /// Calls that break taint chains.
    #[serde(default)]
    pub sanitizers: Vec<Sanitizer>,
}

/// Identity and reporting metadata carried alongside a `Config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleInfo {
    /// Rule id, e.g. `G704`.
    pub id: String,
    /// Finding description.
    pub description: String,
    /// Severity attached to findings.
    pub severity: Severity,
    /// Confidence attached to findings.
    pub confidence: Confidence,
}

impl RuleInfo {
    /// Creates rule metadata.
    #[must_use]
    pub fn new(id: &str, description: &str, severity: Severity, confidence: Confidence) -> Self {
        Self {
            id: id.to_owned(),
            description: description.to_owned(),
            severity,
            confidence,
        }
    }
}

/// One entry of a rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintRule {
    /// Rule id.
    pub id: String,
    /// Finding description.
    pub description: String,
    /// Severity, defaults to medium.
    #[serde(default = "default_severity")]
    pub severity: Severity,
    /// Confidence, defaults to high.
    #[serde(default = "default_confidence")]
    pub confidence: Confidence,
    /// Taint configuration.
    #[serde(flatten)]
    pub config: Config,
}

fn default_severity() -> Severity {
    Severity::Medium
}

fn default_confidence() -> Confidence {
    Confidence::High
}

impl TaintRule {
    /// The `RuleInfo` view of this rule.
    #[must_use]
    pub fn info(&self) -> RuleInfo {
        RuleInfo::new(&self.id, &self.description, self.severity, self.confidence)
    }
}

/// Rule loading failures.
#[derive(Debug, Error)]
pub enum RuleLoadError {
    /// The rule file could not be read.
    #[error("failed to read rule file: {0}")]
    Io(#[from] std::io::Error),
    /// The rule file is not valid JSON for the expected shape.
    #[error("failed to parse rule file: {0}")]
    Parse(#[from] serde_json::Error),
    /// The rule parsed but is semantically malformed.
    #[error("invalid rule {rule}: {reason}")]
    Invalid {
        /// Offending rule id, or `<unnamed>`.
        rule: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Parses and validates a JSON rule document (an array of rule objects).
pub fn parse_rules(json: &str) -> Result<Vec<TaintRule>, RuleLoadError> {
    let rules: Vec<TaintRule> = serde_json::from_str(json)?;
    for rule in &rules {
        validate_rule(rule)?;
    }
    Ok(rules)
}

/// Loads rules from a file path.
pub fn load_rule_file(path: &Path) -> Result<Vec<TaintRule>, RuleLoadError> {
    let content = fs::read_to_string(path)?;
    parse_rules(&content)
}

fn validate_rule(rule: &TaintRule) -> Result<(), RuleLoadError> {
    let invalid = |reason: &str| RuleLoadError::Invalid {
        rule: if rule.id.is_empty() {
            "<unnamed>".to_owned()
        } else {
            rule.id.clone()
        },
        reason: reason.to_owned(),
    };

    if rule.id.is_empty() {
        return Err(invalid("empty rule id"));
    }
    for source in &rule.config.sources {
        if source.package.is_empty() || source.name.is_empty() {
            return Err(invalid("source requires package and name"));
        }
    }
    for sink in &rule.config.sinks {
        if sink.package.is_empty() || sink.method.is_empty() {
            return Err(invalid("sink requires package and method"));
        }
        if let Some(check_args) = &sink.check_args {
            for idx in sink.arg_type_guards.keys() {
                if !check_args.contains(idx) {
                    return Err(invalid("arg type guard on an argument excluded by check_args"));
                }
            }
        }
    }
    for sanitizer in &rule.config.sanitizers {
        if sanitizer.package.is_empty() || sanitizer.method.is_empty() {
            return Err(invalid("sanitizer requires package and method"));
        }
    }
    Ok(())
}
