//! Sink and sanitizer call matching.
//!
//! A call site matches by callee package, name, and (for methods) receiver
//! type name with pointerness. Interface invocations match through the
//! interface's named type as the receiver; dynamic call sites with no
//! static callee never match.

use crate::ssa::{CallCommon, CallTarget, Program, Type};

use super::config::{Config, Sanitizer, Sink};

/// Finds the first declared sink matching this call, if any.
#[must_use]
pub fn find_sink<'c>(program: &Program, call: &CallCommon, config: &'c Config) -> Option<&'c Sink> {
    config.sinks.iter().find(|sink| {
        call_matches(program, call, &sink.package, &sink.receiver, &sink.method, sink.pointer)
    })
}

/// Whether this call matches any declared sanitizer.
#[must_use]
pub fn matches_sanitizer(program: &Program, call: &CallCommon, config: &Config) -> bool {
    config.sanitizers.iter().any(|sanitizer| {
        let Sanitizer {
            package,
            receiver,
            method,
            pointer,
        } = sanitizer;
        call_matches(program, call, package, receiver, method, *pointer)
    })
}

/// Shared matcher for sinks and sanitizers.
fn call_matches(
    program: &Program,
    call: &CallCommon,
    package: &str,
    receiver: &str,
    method: &str,
    pointer: bool,
) -> bool {
    match &call.target {
        CallTarget::Invoke { recv, method: name } => {
            if receiver.is_empty() || name != method {
                return false;
            }
            let ty = program.type_of(*recv);
            let is_pointer = matches!(ty, Type::Pointer(_));
            let Some(named) = ty.strip_pointer().as_named() else {
                return false;
            };
            named.package == package && named.name == receiver && is_pointer == pointer
        }
        CallTarget::Value(_) => {
            let Some(callee) = call.static_callee(program) else {
                return false;
            };
            let callee = program.func(callee);
            if callee.package != package || callee.name != method {
                return false;
            }
            match (&callee.signature.recv, receiver.is_empty()) {
                (None, true) => true,
                (None, false) | (Some(_), true) => false,
                (Some(recv_ty), false) => {
                    let is_pointer = matches!(recv_ty, Type::Pointer(_));
                    match recv_ty.strip_pointer().as_named() {
                        Some(named) => named.name == receiver && is_pointer == pointer,
                        None => false,
                    }
                }
            }
        }
    }
}
