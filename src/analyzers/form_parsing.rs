//! Unbounded form parsing detection for HTTP handlers.
//!
//! A handler that calls `ParseForm`, `ParseMultipartForm`, `FormValue`, or
//! `PostFormValue` without first bounding the request body can be driven
//! into memory exhaustion. Protection is recognized directly (a store of a
//! `MaxBytesReader` result into the request) or through a wrapper function
//! or middleware closure that bounds the body before delegating to the
//! handler via `ServeHTTP`.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::dependency::{DependencyChecker, MAX_DEPTH};
use crate::issue::{Confidence, Issue, IssueSet, Severity};
use crate::ssa::{FuncId, Program, Type, ValueId, ValueKind};
use crate::taint::CallGraph;

const HTTP_PACKAGE: &str = "net/http";
const RISKY_METHODS: [&str; 4] = ["ParseForm", "ParseMultipartForm", "FormValue", "PostFormValue"];

pub(crate) const MSG_UNBOUNDED_FORM_PARSING: &str =
    "Parsing form data without limiting request body size can allow memory exhaustion (use http.MaxBytesReader)";

/// Detects form parsing in handlers whose request body is unbounded.
pub struct FormParsingAnalyzer {
    id: String,
    description: String,
}

impl FormParsingAnalyzer {
    /// Creates the analyzer with its reporting identity.
    #[must_use]
    pub fn new(id: &str, description: &str) -> Self {
        Self {
            id: id.to_owned(),
            description: description.to_owned(),
        }
    }

    /// Runs the analyzer over the source-function set.
    #[must_use]
    pub fn analyze(&self, program: &Program, source_funcs: &[FuncId]) -> Vec<Issue> {
        if source_funcs.is_empty() {
            return Vec::new();
        }
        let call_graph = CallGraph::build(program, source_funcs);
        let universe = call_graph.functions();
        let mut checker = DependencyChecker::new(program);
        let protected = compute_handler_protection(program, universe, &mut checker);
        debug!(
            id = %self.id,
            functions = universe.len(),
            protected = protected.len(),
            "handler protection computed"
        );

        let mut issues = IssueSet::new();
        for &func in universe {
            let Some((request_param, _writer_param)) = handler_params(program, func) else {
                continue;
            };
            if protected.contains(&func) {
                continue;
            }
            for &instr in call_graph.call_sites(func) {
                if !is_risky_form_parsing_call(program, instr, request_param, &mut checker) {
                    continue;
                }
                if let Some(pos) = &program.value(instr).pos {
                    issues.insert(Issue::new(
                        &self.id,
                        &self.description,
                        Severity::Medium,
                        Confidence::High,
                        pos,
                    ));
                }
            }
        }

        issues.into_sorted_vec()
    }
}

/// Computes, for every handler in the universe, whether its request body is
/// bounded before it runs: either directly in its own body or through a
/// wrapper call that interposes the limit.
fn compute_handler_protection(
    program: &Program,
    universe: &[FuncId],
    checker: &mut DependencyChecker<'_>,
) -> FxHashSet<FuncId> {
    let mut protected = FxHashSet::default();
    for &func in universe {
        let Some((request_param, writer_param)) = handler_params(program, func) else {
            continue;
        };
        if function_has_request_body_limit(program, func, request_param, writer_param, checker) {
            protected.insert(func);
            continue;
        }
        if is_protected_by_wrapper(program, func, universe, checker) {
            protected.insert(func);
        }
    }
    protected
}

/// A handler is protected by a wrapper when some call site passes the
/// handler (transitively) as argument `i` to a function that bounds the
/// request body and delegates to its parameter `i` via `ServeHTTP`, either
/// in its own body or through a closure capturing the handler.
fn is_protected_by_wrapper(
    program: &Program,
    handler: FuncId,
    universe: &[FuncId],
    checker: &mut DependencyChecker<'_>,
) -> bool {
    let handler_value = program.func(handler).func_value;
    for &func in universe {
        for instr in program.func_instrs(func) {
            let ValueKind::Call(call) = &program.value(instr).kind else {
                continue;
            };
            let Some(wrapper) = call.static_callee(program) else {
                continue;
            };
            for (arg_index, &arg) in call.args.iter().enumerate() {
                if !checker.depends_on(arg, handler_value) {
                    continue;
                }
                if wrapper_protects_param_handler(program, wrapper, arg_index, checker) {
                    return true;
                }
            }
        }
    }
    false
}

fn wrapper_protects_param_handler(
    program: &Program,
    wrapper: FuncId,
    param_index: usize,
    checker: &mut DependencyChecker<'_>,
) -> bool {
    let wrapper_fn = program.func(wrapper);
    let Some(&handler_param) = wrapper_fn.params.get(param_index) else {
        return false;
    };

    if wrapper_delegates_with_request_limit(program, wrapper, handler_param, checker) {
        return true;
    }

    for instr in program.func_instrs(wrapper) {
        let ValueKind::MakeClosure { func: closure_fn, bindings } = &program.value(instr).kind
        else {
            continue;
        };
        let Some((request_param, writer_param)) = handler_params(program, *closure_fn) else {
            continue;
        };
        if !function_has_request_body_limit(program, *closure_fn, request_param, writer_param, checker)
        {
            continue;
        }

        for (binding_index, &binding) in bindings.iter().enumerate() {
            if !binding_depends_on_value(program, binding, handler_param, checker) {
                continue;
            }
            if closure_delegates_with_request_limit(
                program,
                *closure_fn,
                binding_index,
                request_param,
                writer_param,
                checker,
            ) {
                return true;
            }
        }
    }

    false
}

/// Direct binding, or an address-taken capture: a binding that is an
/// allocation cell counts when some store into the cell writes a value
/// derived from the handler.
fn binding_depends_on_value(
    program: &Program,
    binding: ValueId,
    target: ValueId,
    checker: &mut DependencyChecker<'_>,
) -> bool {
    if checker.depends_on(binding, target) {
        return true;
    }

    let data = program.value(binding);
    if !matches!(data.kind, ValueKind::Alloc) {
        return false;
    }
    let Some(parent) = data.parent else {
        return false;
    };

    for instr in program.func_instrs(parent) {
        let ValueKind::Store { addr, val } = program.value(instr).kind else {
            continue;
        };
        if addr != binding {
            continue;
        }
        if checker.depends_on(val, target) {
            return true;
        }
    }
    false
}

fn wrapper_delegates_with_request_limit(
    program: &Program,
    wrapper: FuncId,
    handler_value: ValueId,
    checker: &mut DependencyChecker<'_>,
) -> bool {
    let Some((request_param, writer_param)) = handler_params(program, wrapper) else {
        return false;
    };
    if !function_has_request_body_limit(program, wrapper, request_param, writer_param, checker) {
        return false;
    }
    has_serve_http_delegation(program, wrapper, handler_value, writer_param, request_param, checker)
}

fn closure_delegates_with_request_limit(
    program: &Program,
    closure: FuncId,
    free_var_index: usize,
    request_param: ValueId,
    writer_param: ValueId,
    checker: &mut DependencyChecker<'_>,
) -> bool {
    let Some(&handler_value) = program.func(closure).free_vars.get(free_var_index) else {
        return false;
    };
    has_serve_http_delegation(program, closure, handler_value, writer_param, request_param, checker)
}

/// Scans `func` for a `ServeHTTP` invocation whose receiver derives from
/// the handler and whose writer/request arguments derive from the given
/// writer and request values.
fn has_serve_http_delegation(
    program: &Program,
    func: FuncId,
    handler_value: ValueId,
    writer_value: ValueId,
    request_value: ValueId,
    checker: &mut DependencyChecker<'_>,
) -> bool {
    for instr in program.func_instrs(func) {
        let ValueKind::Call(call) = &program.value(instr).kind else {
            continue;
        };

        let (receiver, writer, request) = match &call.target {
            crate::ssa::CallTarget::Invoke { recv, method } if method == "ServeHTTP" => {
                if call.args.len() < 2 {
                    continue;
                }
                (*recv, call.args[0], call.args[1])
            }
            _ => {
                let Some(callee) = call.static_callee(program) else {
                    continue;
                };
                let callee = program.func(callee);
                if callee.name != "ServeHTTP" || callee.signature.recv.is_none() {
                    continue;
                }
                if call.args.len() < 3 {
                    continue;
                }
                (call.args[0], call.args[1], call.args[2])
            }
        };

        if checker.depends_on(receiver, handler_value)
            && checker.depends_on(writer, writer_value)
            && checker.depends_on(request, request_value)
        {
            return true;
        }
    }
    false
}

/// Finds the request and writer parameters that make `func` a handler:
/// one `*net/http.Request` and one `net/http.ResponseWriter`, in either
/// order.
fn handler_params(program: &Program, func: FuncId) -> Option<(ValueId, ValueId)> {
    let mut request_param = None;
    let mut writer_param = None;

    for &param in &program.func(func).params {
        let ty = program.type_of(param);
        if request_param.is_none() && is_http_request_pointer_type(ty) {
            request_param = Some(param);
            continue;
        }
        if writer_param.is_none() && is_http_response_writer_type(ty) {
            writer_param = Some(param);
        }
    }

    Some((request_param?, writer_param?))
}

fn is_http_request_pointer_type(ty: &Type) -> bool {
    let Type::Pointer(elem) = ty else {
        return false;
    };
    elem.as_named()
        .is_some_and(|named| named.name == "Request" && named.package == HTTP_PACKAGE)
}

fn is_http_response_writer_type(ty: &Type) -> bool {
    ty.as_named()
        .is_some_and(|named| named.name == "ResponseWriter" && named.package == HTTP_PACKAGE)
}

/// A store of a `MaxBytesReader` result into a field of the request marks
/// the body as bounded.
fn function_has_request_body_limit(
    program: &Program,
    func: FuncId,
    request_param: ValueId,
    writer_param: ValueId,
    checker: &mut DependencyChecker<'_>,
) -> bool {
    for instr in program.func_instrs(func) {
        let ValueKind::Store { addr, val } = program.value(instr).kind else {
            continue;
        };
        let ValueKind::FieldAddr { x, .. } = program.value(addr).kind else {
            continue;
        };
        if !checker.depends_on(x, request_param) {
            continue;
        }
        if is_max_bytes_reader_value(program, val, request_param, writer_param, checker, 0) {
            return true;
        }
    }
    false
}

/// Whether `value` is (possibly through conversions, interface boxing, or
/// phi joins) a `net/http.MaxBytesReader` call bounding this handler's
/// writer and request.
fn is_max_bytes_reader_value(
    program: &Program,
    value: ValueId,
    request_param: ValueId,
    writer_param: ValueId,
    checker: &mut DependencyChecker<'_>,
    depth: usize,
) -> bool {
    if depth > MAX_DEPTH {
        return false;
    }

    match &program.value(value).kind {
        ValueKind::Call(call) => {
            let Some(callee) = call.static_callee(program) else {
                return false;
            };
            let callee = program.func(callee);
            if callee.name != "MaxBytesReader" || callee.package != HTTP_PACKAGE {
                return false;
            }
            if call.args.len() < 3 {
                return false;
            }
            checker.depends_on(call.args[0], writer_param)
                && checker.depends_on(call.args[1], request_param)
        }
        ValueKind::ChangeType { x }
        | ValueKind::MakeInterface { x }
        | ValueKind::TypeAssert { x } => {
            is_max_bytes_reader_value(program, *x, request_param, writer_param, checker, depth + 1)
        }
        ValueKind::Phi { edges } => edges.iter().any(|&edge| {
            is_max_bytes_reader_value(program, edge, request_param, writer_param, checker, depth + 1)
        }),
        _ => false,
    }
}

/// A call to one of the form-parsing methods of `*net/http.Request` whose
/// receiver derives from this handler's request parameter.
fn is_risky_form_parsing_call(
    program: &Program,
    instr: ValueId,
    request_param: ValueId,
    checker: &mut DependencyChecker<'_>,
) -> bool {
    let ValueKind::Call(call) = &program.value(instr).kind else {
        return false;
    };
    let Some(callee) = call.static_callee(program) else {
        return false;
    };
    let callee = program.func(callee);

    let Some(recv) = &callee.signature.recv else {
        return false;
    };
    if !is_http_request_pointer_type(recv) {
        return false;
    }
    if !RISKY_METHODS.contains(&callee.name.as_str()) {
        return false;
    }
    let Some(&receiver) = call.args.first() else {
        return false;
    };
    checker.depends_on(receiver, request_param)
}
