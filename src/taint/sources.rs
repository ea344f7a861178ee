//! Taint source identification.
//!
//! Decides whether a single SSA value originates in a declared source:
//! parameters (and captured variables) of tainted named types, results of
//! tainted calls, and reads of tainted package-level variables. Derived
//! values (field loads, conversions) are the propagator's job.

use crate::ssa::{NamedType, Program, Type, ValueId, ValueKind};

use super::config::{Config, Source};

/// Whether `value` is itself a declared source under `config`.
#[must_use]
pub fn is_source(program: &Program, config: &Config, value: ValueId) -> bool {
    let data = program.value(value);
    match &data.kind {
        ValueKind::Parameter { .. } | ValueKind::FreeVar { .. } => config
            .sources
            .iter()
            .filter(|source| !source.is_function)
            .any(|source| type_matches_source(&data.ty, source)),
        ValueKind::Call(call) => {
            let Some(callee) = call.static_callee(program) else {
                return false;
            };
            let callee = program.func(callee);
            config
                .sources
                .iter()
                .filter(|source| source.is_function)
                .any(|source| callee.package == source.package && callee.name == source.name)
        }
        // Loads of tainted package-level variables, e.g. `os.Args`.
        ValueKind::UnOp { x, .. } => global_matches(program, config, *x),
        ValueKind::Global { .. } => global_matches(program, config, value),
        _ => false,
    }
}

fn global_matches(program: &Program, config: &Config, value: ValueId) -> bool {
    let ValueKind::Global { package, name } = &program.value(value).kind else {
        return false;
    };
    config
        .sources
        .iter()
        .filter(|source| !source.is_function)
        .any(|source| &source.package == package && &source.name == name)
}

/// Matches a value type against a named-type source, honoring the declared
/// pointerness: a `pointer` source matches only `*pkg.Name`, a value source
/// only `pkg.Name`.
fn type_matches_source(ty: &Type, source: &Source) -> bool {
    let named: &NamedType = if source.pointer {
        let Type::Pointer(elem) = ty else {
            return false;
        };
        match elem.as_named() {
            Some(named) => named,
            None => return false,
        }
    } else {
        match ty.as_named() {
            Some(named) => named,
            None => return false,
        }
    };
    named.package == source.package && named.name == source.name
}
