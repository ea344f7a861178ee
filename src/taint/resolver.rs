//! Type resolution for sink argument guards.
//!
//! Matches SSA value types against named types and interfaces by qualified
//! name, and evaluates the per-argument type preconditions a sink may
//! declare.

use crate::ssa::{Program, Type, ValueId, ValueKind};

use super::config::Sink;

/// Resolves a fully qualified type name (`net/http.ResponseWriter`) against
/// the program's package scopes. The member must be a declared type name;
/// vars, consts, and funcs do not resolve.
#[must_use]
pub fn lookup_named_type(qualified: &str, program: &Program) -> Option<Type> {
    let (package, name) = qualified.rsplit_once('.')?;
    program.package_by_path(package)?.type_member(name).cloned()
}

/// Whether `actual` satisfies `required`: interface satisfaction by
/// structural method-set inclusion, otherwise identity with the required
/// type or a pointer to it.
#[must_use]
pub fn satisfies(required: &Type, actual: &Type) -> bool {
    if let Some(methods) = required.interface_methods() {
        return actual.implements(methods);
    }
    actual == required || actual == &required.clone().pointer_to()
}

/// The pre-conversion type of a value: unwraps one `MakeInterface` boxing
/// or `ChangeInterface` conversion so that an argument passed through an
/// interface parameter is judged by what it was before the conversion, not
/// by the interface.
#[must_use]
pub fn resolve_original_type(program: &Program, value: ValueId) -> Type {
    match &program.value(value).kind {
        ValueKind::MakeInterface { x } | ValueKind::ChangeInterface { x } => {
            program.type_of(*x).clone()
        }
        _ => program.type_of(value).clone(),
    }
}

/// Whether a type is `context.Context` (possibly behind a pointer): a named
/// type called `Context` declared in a package whose import path's last
/// segment is `context`. Request-context handles carry no user payload and
/// must never propagate taint.
#[must_use]
pub fn is_context_type(ty: &Type) -> bool {
    let Some(named) = ty.strip_pointer().as_named() else {
        return false;
    };
    if named.name != "Context" {
        return false;
    }
    named.package.rsplit('/').next() == Some("context")
}

/// Evaluates a sink's argument type guards against a call's arguments.
///
/// Guards pass trivially when the sink declares none, and are skipped when
/// no program is available (no type information, assume pass). A guard on a
/// missing argument fails, as does a required type that cannot be found in
/// the program: the sink does not fire on guesswork.
#[must_use]
pub fn guards_satisfied(args: &[ValueId], sink: &Sink, program: Option<&Program>) -> bool {
    if sink.arg_type_guards.is_empty() {
        return true;
    }
    let Some(program) = program else {
        return true;
    };

    for (&idx, required_name) in &sink.arg_type_guards {
        let Some(&arg) = args.get(idx) else {
            return false;
        };
        let Some(required) = lookup_named_type(required_name, program) else {
            return false;
        };
        let actual = resolve_original_type(program, arg);
        if !satisfies(&required, &actual) {
            return false;
        }
    }
    true
}
