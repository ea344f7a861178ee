//! Declarative rule file loading and validation.

use std::io::Write;

use taintflow::analyzers::from_rules;
use taintflow::issue::{Confidence, Severity};
use taintflow::taint::config::{load_rule_file, parse_rules, RuleLoadError};

const SSRF_RULE: &str = r#"[
  {
    "id": "G704",
    "description": "Potential SSRF",
    "severity": "HIGH",
    "confidence": "MEDIUM",
    "sources": [
      {"package": "net/http", "name": "Request", "pointer": true},
      {"package": "os", "name": "Getenv", "is_function": true}
    ],
    "sinks": [
      {"package": "net/http", "method": "Get"},
      {"package": "net/http", "method": "Post", "check_args": [0]}
    ],
    "sanitizers": []
  }
]"#;

#[test]
fn parses_a_complete_rule() {
    let rules = parse_rules(SSRF_RULE).expect("valid rule file");
    assert_eq!(rules.len(), 1);
    let rule = &rules[0];
    assert_eq!(rule.id, "G704");
    assert_eq!(rule.severity, Severity::High);
    assert_eq!(rule.confidence, Confidence::Medium);
    assert_eq!(rule.config.sources.len(), 2);
    assert!(rule.config.sources[0].pointer);
    assert!(rule.config.sources[1].is_function);
    assert_eq!(rule.config.sinks[1].check_args, Some(vec![0]));
}

#[test]
fn severity_and_confidence_default_when_absent() {
    let rules = parse_rules(
        r#"[{"id": "T001", "description": "d",
             "sinks": [{"package": "fmt", "method": "Fprintf"}]}]"#,
    )
    .expect("valid rule file");
    assert_eq!(rules[0].severity, Severity::Medium);
    assert_eq!(rules[0].confidence, Confidence::High);
}

#[test]
fn arg_type_guards_parse_integer_keys() {
    let rules = parse_rules(
        r#"[{"id": "T001", "description": "d",
             "sinks": [{"package": "fmt", "method": "Fprintf",
                        "arg_type_guards": {"0": "net/http.ResponseWriter"}}]}]"#,
    )
    .expect("valid rule file");
    let guards = &rules[0].config.sinks[0].arg_type_guards;
    assert_eq!(guards.get(&0).map(String::as_str), Some("net/http.ResponseWriter"));
}

#[test]
fn malformed_json_is_rejected() {
    let err = parse_rules("this is not json").expect_err("must reject");
    assert!(matches!(err, RuleLoadError::Parse(_)));
}

#[test]
fn empty_rule_id_is_rejected() {
    let err = parse_rules(r#"[{"id": "", "description": "d"}]"#).expect_err("must reject");
    assert!(matches!(err, RuleLoadError::Invalid { .. }));
}

#[test]
fn sink_without_method_is_rejected() {
    let err = parse_rules(r#"[{"id": "T001", "description": "d", "sinks": [{"package": "fmt", "method": ""}]}]"#)
        .expect_err("must reject");
    let RuleLoadError::Invalid { rule, .. } = err else {
        panic!("expected Invalid, got another variant");
    };
    assert_eq!(rule, "T001");
}

#[test]
fn guard_outside_check_args_is_rejected() {
    let err = parse_rules(
        r#"[{"id": "T001", "description": "d",
             "sinks": [{"package": "fmt", "method": "Fprintf",
                        "check_args": [1],
                        "arg_type_guards": {"0": "net/http.ResponseWriter"}}]}]"#,
    )
    .expect_err("must reject");
    assert!(matches!(err, RuleLoadError::Invalid { .. }));
}

#[test]
fn loads_rules_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(SSRF_RULE.as_bytes()).expect("write rules");
    let rules = load_rule_file(file.path()).expect("load from disk");
    assert_eq!(rules.len(), 1);

    let analyzers = from_rules(&rules);
    assert_eq!(analyzers.len(), 1);
    assert_eq!(analyzers[0].id(), "G704");
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_rule_file(std::path::Path::new("/nonexistent/rules.json"))
        .expect_err("must reject");
    assert!(matches!(err, RuleLoadError::Io(_)));
}
