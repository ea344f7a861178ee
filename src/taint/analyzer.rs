//! Source-to-sink taint analysis entry point.
//!
//! For every function in the user-supplied source set, each call site is
//! checked against the rule's sinks; a finding is emitted when a matching
//! sink with satisfied argument guards receives a tainted argument.
//! Functions are analyzed in parallel with per-worker caches merged at
//! join, which keeps the result deterministic.

use rayon::prelude::*;
use tracing::debug;

use crate::issue::{Issue, IssueSet};
use crate::ssa::{FuncId, Program, ValueKind};

use super::call_graph::CallGraph;
use super::config::{Config, RuleInfo};
use super::propagation::TaintEngine;
use super::resolver::guards_satisfied;
use super::sinks::find_sink;

/// One taint rule bound to its reporting metadata.
pub struct TaintAnalyzer {
    rule: RuleInfo,
    config: Config,
}

impl TaintAnalyzer {
    /// Creates an analyzer for one rule.
    #[must_use]
    pub fn new(rule: RuleInfo, config: Config) -> Self {
        Self { rule, config }
    }

    /// The rule this analyzer reports under.
    #[must_use]
    pub fn rule(&self) -> &RuleInfo {
        &self.rule
    }

    /// Runs the rule over the source-function set and returns findings
    /// ordered by position.
    #[must_use]
    pub fn analyze(&self, program: &Program, source_funcs: &[FuncId]) -> Vec<Issue> {
        if source_funcs.is_empty() {
            return Vec::new();
        }
        debug!(rule = %self.rule.id, functions = source_funcs.len(), "taint analysis start");

        let call_graph = CallGraph::build(program, source_funcs);
        let issues = source_funcs
            .par_iter()
            .map(|&func| self.analyze_function(program, &call_graph, func))
            .reduce(IssueSet::new, |mut merged, set| {
                merged.merge(set);
                merged
            });

        let issues = issues.into_sorted_vec();
        debug!(rule = %self.rule.id, findings = issues.len(), "taint analysis done");
        issues
    }

    fn analyze_function(&self, program: &Program, call_graph: &CallGraph, func: FuncId) -> IssueSet {
        let mut issues = IssueSet::new();
        let mut engine = TaintEngine::new(program, &self.config);

        for &site in call_graph.call_sites(func) {
            let data = program.value(site);
            let ValueKind::Call(call) = &data.kind else {
                continue;
            };
            let Some(sink) = find_sink(program, call, &self.config) else {
                continue;
            };
            if !guards_satisfied(&call.args, sink, Some(program)) {
                continue;
            }
            let Some(pos) = &data.pos else {
                continue;
            };

            let tainted = match &sink.check_args {
                Some(indices) => indices
                    .iter()
                    .filter_map(|&idx| call.args.get(idx).copied())
                    .any(|arg| engine.is_tainted(arg)),
                None => call.args.iter().any(|&arg| engine.is_tainted(arg)),
            };
            if tainted {
                issues.insert(Issue::new(
                    &self.rule.id,
                    &self.rule.description,
                    self.rule.severity,
                    self.rule.confidence,
                    pos,
                ));
            }
        }

        issues
    }
}
