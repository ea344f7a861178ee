//! Core library of the Taintflow static security analyzer.
//!
//! Taintflow analyzes Go-style programs in SSA form for two families of
//! findings: interprocedural source-to-sink taint flows (SSRF, XSS, and any
//! declaratively configured rule) and HTTP handlers that parse form data
//! without bounding the request body. The SSA program is built by an
//! external collaborator and is read-only here; analyzers expose a single
//! blocking call that returns a deduplicated, position-sorted finding list.

#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Analyzer registry and the adapter surface for drivers.
pub mod analyzers;

/// Memoized, cycle-safe dependency walking over SSA value graphs.
pub mod dependency;

/// Finding records, severity/confidence, position-keyed deduplication.
pub mod issue;

/// The SSA program and type model the analyzers consume.
pub mod ssa;

/// The interprocedural taint analysis engine.
pub mod taint;

/// Builders for assembling SSA programs in tests.
pub mod test_utils;

pub use analyzers::{builtin_analyzers, AnalysisError, Analyzer, SsaResult};
pub use issue::{Confidence, Issue, Severity};
pub use taint::{Config, RuleInfo, TaintAnalyzer};
