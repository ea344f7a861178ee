//! Analyzer registry and the adapter surface the driver calls.
//!
//! An `Analyzer` binds a rule identity to one of the two SSA engines (taint
//! flow, form-parsing limits) and exposes a single blocking `run` over the
//! SSA input. Built-in rules mirror the shipped rule set; additional taint
//! rules come from declarative rule files.

/// Unbounded form parsing detection.
pub mod form_parsing;

use thiserror::Error;

use crate::issue::{Confidence, Issue, Severity};
use crate::ssa::{FuncId, Program};
use crate::taint::{Config, RuleInfo, Sanitizer, Sink, Source, TaintAnalyzer, TaintRule};

use form_parsing::FormParsingAnalyzer;

/// The SSA input contract: a built program plus the functions to analyze.
#[derive(Debug)]
pub struct SsaResult {
    /// The whole-program SSA graph.
    pub program: Program,
    /// Functions the analyzers traverse.
    pub source_funcs: Vec<FuncId>,
}

/// Failures that abort an analyzer run. Partial information (unresolved
/// callees, missing types) never surfaces here; it is handled
/// conservatively inside the engines.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// The SSA prerequisite was not supplied.
    #[error("no SSA result available for analysis")]
    MissingSsa,
}

enum Engine {
    Taint(TaintAnalyzer),
    FormParsing(FormParsingAnalyzer),
}

/// One registered analyzer.
pub struct Analyzer {
    id: String,
    engine: Engine,
}

impl Analyzer {
    /// A taint-flow analyzer for one declarative rule.
    #[must_use]
    pub fn taint(rule: RuleInfo, config: Config) -> Self {
        Self {
            id: rule.id.clone(),
            engine: Engine::Taint(TaintAnalyzer::new(rule, config)),
        }
    }

    /// The form-parsing body-limit analyzer.
    #[must_use]
    pub fn form_parsing_limits(id: &str, description: &str) -> Self {
        Self {
            id: id.to_owned(),
            engine: Engine::FormParsing(FormParsingAnalyzer::new(id, description)),
        }
    }

    /// Rule id this analyzer reports under.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Runs the analyzer. Missing SSA input is a hard error; an empty
    /// source-function set yields an empty finding list.
    pub fn run(&self, ssa: Option<&SsaResult>) -> Result<Vec<Issue>, AnalysisError> {
        let ssa = ssa.ok_or(AnalysisError::MissingSsa)?;
        let issues = match &self.engine {
            Engine::Taint(analyzer) => analyzer.analyze(&ssa.program, &ssa.source_funcs),
            Engine::FormParsing(analyzer) => analyzer.analyze(&ssa.program, &ssa.source_funcs),
        };
        Ok(issues)
    }
}

/// Builds taint analyzers from parsed rule-file entries.
#[must_use]
pub fn from_rules(rules: &[TaintRule]) -> Vec<Analyzer> {
    rules
        .iter()
        .map(|rule| Analyzer::taint(rule.info(), rule.config.clone()))
        .collect()
}

/// The built-in rule set: SSRF and XSS taint rules plus the form-parsing
/// limit analyzer.
#[must_use]
pub fn builtin_analyzers() -> Vec<Analyzer> {
    vec![
        Analyzer::taint(ssrf_rule(), ssrf_config()),
        Analyzer::taint(xss_rule(), xss_config()),
        Analyzer::form_parsing_limits("G120", form_parsing::MSG_UNBOUNDED_FORM_PARSING),
    ]
}

fn ssrf_rule() -> RuleInfo {
    RuleInfo::new(
        "G704",
        "Potential server-side request forgery: request URL derived from user-controlled input",
        Severity::High,
        Confidence::Medium,
    )
}

fn ssrf_config() -> Config {
    let http_sink = |method: &str| Sink {
        package: "net/http".to_owned(),
        receiver: String::new(),
        method: method.to_owned(),
        pointer: false,
        check_args: None,
        arg_type_guards: Default::default(),
    };
    Config {
        sources: vec![
            Source {
                package: "net/http".to_owned(),
                name: "Request".to_owned(),
                pointer: true,
                is_function: false,
            },
            Source {
                package: "os".to_owned(),
                name: "Getenv".to_owned(),
                pointer: false,
                is_function: true,
            },
        ],
        sinks: vec![
            http_sink("Get"),
            http_sink("Post"),
            http_sink("Head"),
            http_sink("PostForm"),
            http_sink("NewRequest"),
            http_sink("NewRequestWithContext"),
        ],
        sanitizers: Vec::new(),
    }
}

fn xss_rule() -> RuleInfo {
    RuleInfo::new(
        "G705",
        "Potential XSS: user-controlled data written to HTTP response without escaping",
        Severity::Medium,
        Confidence::High,
    )
}

fn xss_config() -> Config {
    let writer_guarded_sink = |method: &str| Sink {
        package: "fmt".to_owned(),
        receiver: String::new(),
        method: method.to_owned(),
        pointer: false,
        check_args: None,
        arg_type_guards: [(0, "net/http.ResponseWriter".to_owned())].into_iter().collect(),
    };
    let sanitizer = |package: &str, method: &str| Sanitizer {
        package: package.to_owned(),
        receiver: String::new(),
        method: method.to_owned(),
        pointer: false,
    };
    Config {
        sources: vec![Source {
            package: "net/http".to_owned(),
            name: "Request".to_owned(),
            pointer: true,
            is_function: false,
        }],
        sinks: vec![
            Sink {
                package: "net/http".to_owned(),
                receiver: "ResponseWriter".to_owned(),
                method: "Write".to_owned(),
                pointer: false,
                check_args: None,
                arg_type_guards: Default::default(),
            },
            writer_guarded_sink("Fprintf"),
            writer_guarded_sink("Fprint"),
            writer_guarded_sink("Fprintln"),
        ],
        sanitizers: vec![
            sanitizer("html", "EscapeString"),
            sanitizer("html/template", "HTMLEscapeString"),
            sanitizer("encoding/json", "Marshal"),
            sanitizer("strconv", "Atoi"),
            sanitizer("strconv", "Itoa"),
            sanitizer("strconv", "Quote"),
            sanitizer("net/url", "QueryEscape"),
        ],
    }
}
