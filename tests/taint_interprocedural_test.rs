//! Interprocedural taint propagation: callee summaries, environment
//! sources inside callees, and recursion.

use taintflow::analyzers::{builtin_analyzers, Analyzer, SsaResult};
use taintflow::issue::{Confidence, Severity};
use taintflow::ssa::{Signature, Type};
use taintflow::taint::{Config, RuleInfo, Sink, Source};
use taintflow::test_utils::{fixtures, ProgramBuilder};

fn builtin(id: &str) -> Analyzer {
    builtin_analyzers()
        .into_iter()
        .find(|a| a.id() == id)
        .expect("built-in rule present")
}

fn handler_sig(env: &fixtures::HttpEnv) -> Signature {
    Signature::func(
        vec![env.response_writer.clone(), env.request.clone().pointer_to()],
        Vec::new(),
    )
}

// ============================================================================
// Direct SSRF shapes
// ============================================================================

#[test]
fn request_url_to_http_get_is_flagged() {
    let mut pb = ProgramBuilder::new();
    let env = fixtures::http_env(&mut pb);
    pb.package("main", "main");

    let mut f = pb.function("main", "fetch_handler", handler_sig(&env));
    let r = f.param_id(1);
    let url_addr = f.field_addr(r, 0, "URL", env.url.clone().pointer_to());
    let url = f.load(url_addr);
    let query = f.call(env.url_query, vec![url]);
    let key = f.const_str("url");
    let target = f.call(env.values_get, vec![query, key]);
    f.call(env.http_get, vec![target]);
    f.ret(Vec::new());
    let handler = f.finish();

    let ssa = SsaResult {
        program: pb.finish(),
        source_funcs: vec![handler],
    };
    let issues = builtin("G704").run(Some(&ssa)).expect("analysis runs");
    assert_eq!(issues.len(), 1, "user-controlled URL must be flagged");
    assert_eq!(issues[0].rule_id, "G704");
}

#[test]
fn constant_url_is_clean() {
    let mut pb = ProgramBuilder::new();
    let env = fixtures::http_env(&mut pb);
    pb.package("main", "main");

    let mut f = pb.function("main", "safe_request", Signature::func(Vec::new(), Vec::new()));
    let url = f.const_str("https://api.example.com/data");
    f.call(env.http_get, vec![url]);
    f.ret(Vec::new());
    let safe = f.finish();

    let ssa = SsaResult {
        program: pb.finish(),
        source_funcs: vec![safe],
    };
    let issues = builtin("G704").run(Some(&ssa)).expect("analysis runs");
    assert!(issues.is_empty(), "hardcoded URL must not be flagged");
}

#[test]
fn background_context_request_with_constant_url_is_clean() {
    let mut pb = ProgramBuilder::new();
    let env = fixtures::http_env(&mut pb);
    pb.package("main", "main");
    let background = pb.declare_func(
        "context",
        "Background",
        Signature::func(Vec::new(), vec![env.context.clone()]),
    );

    let mut f = pb.function("main", "public_ip", Signature::func(Vec::new(), Vec::new()));
    let ctx = f.call(background, vec![]);
    let method = f.const_str("GET");
    let url = f.const_str("https://am.i.example.net/ip");
    let body = f.const_nil(Type::any());
    f.call(env.new_request_with_context, vec![ctx, method, url, body]);
    f.ret(Vec::new());
    let func = f.finish();

    let ssa = SsaResult {
        program: pb.finish(),
        source_funcs: vec![func],
    };
    let issues = builtin("G704").run(Some(&ssa)).expect("analysis runs");
    assert!(issues.is_empty(), "constant URL with background context is safe");
}

// ============================================================================
// Flows through callees
// ============================================================================

#[test]
fn environment_read_inside_callee_is_flagged() {
    let mut pb = ProgramBuilder::new();
    let env = fixtures::http_env(&mut pb);
    pb.package("main", "main");

    let mut g = pb.function(
        "main",
        "target_from_env",
        Signature::func(Vec::new(), vec![Type::string()]),
    );
    let key = g.const_str("TARGET_URL");
    let target = g.call(env.os_getenv, vec![key]);
    g.ret(vec![target]);
    let fetch = g.finish();

    let mut f = pb.function("main", "poster", Signature::func(Vec::new(), Vec::new()));
    let target = f.call(fetch, vec![]);
    let content_type = f.const_str("text/plain");
    let body = f.const_nil(Type::any());
    f.call(env.http_post, vec![target, content_type, body]);
    f.ret(Vec::new());
    let poster = f.finish();

    let ssa = SsaResult {
        program: pb.finish(),
        source_funcs: vec![fetch, poster],
    };
    let issues = builtin("G704").run(Some(&ssa)).expect("analysis runs");
    assert_eq!(issues.len(), 1, "environment-derived URL must be flagged");
}

#[test]
fn callee_returning_its_parameter_propagates_taint() {
    let mut pb = ProgramBuilder::new();
    let env = fixtures::http_env(&mut pb);
    pb.package("main", "main");

    let mut g = pb.function(
        "main",
        "passthrough",
        Signature::func(vec![Type::string()], vec![Type::string()]),
    );
    let s = g.param_id(0);
    g.ret(vec![s]);
    let passthrough = g.finish();

    let mut f = pb.function("main", "relay_handler", handler_sig(&env));
    let r = f.param_id(1);
    let key = f.const_str("url");
    let target = f.call(env.form_value, vec![r, key]);
    let relayed = f.call(passthrough, vec![target]);
    f.call(env.http_get, vec![relayed]);
    f.ret(Vec::new());
    let handler = f.finish();

    let ssa = SsaResult {
        program: pb.finish(),
        source_funcs: vec![passthrough, handler],
    };
    let issues = builtin("G704").run(Some(&ssa)).expect("analysis runs");
    assert_eq!(issues.len(), 1, "identity helper must carry taint through");
}

#[test]
fn callee_returning_constant_swallows_taint() {
    let mut pb = ProgramBuilder::new();
    let env = fixtures::http_env(&mut pb);
    pb.package("main", "main");

    let mut g = pb.function(
        "main",
        "fixed_target",
        Signature::func(vec![Type::string()], vec![Type::string()]),
    );
    let fixed = g.const_str("https://internal.example.com");
    g.ret(vec![fixed]);
    let fixed_target = g.finish();

    let mut f = pb.function("main", "pinned_handler", handler_sig(&env));
    let r = f.param_id(1);
    let key = f.const_str("url");
    let requested = f.call(env.form_value, vec![r, key]);
    let pinned = f.call(fixed_target, vec![requested]);
    f.call(env.http_get, vec![pinned]);
    f.ret(Vec::new());
    let handler = f.finish();

    let ssa = SsaResult {
        program: pb.finish(),
        source_funcs: vec![fixed_target, handler],
    };
    let issues = builtin("G704").run(Some(&ssa)).expect("analysis runs");
    assert!(
        issues.is_empty(),
        "a callee ignoring its tainted argument must not propagate taint"
    );
}

#[test]
fn package_level_variable_sources_are_recognized() {
    let mut pb = ProgramBuilder::new();
    let env = fixtures::http_env(&mut pb);
    pb.package("main", "main");
    let os_args = pb.global("os", "Args", Type::string().slice_of());

    let mut f = pb.function("main", "cli_fetch", Signature::func(Vec::new(), Vec::new()));
    let args = f.load(os_args);
    let one = f.const_int(1);
    let target = f.index(args, one, Type::string());
    f.call(env.http_get, vec![target]);
    f.ret(Vec::new());
    let func = f.finish();

    let rule = RuleInfo::new(
        "T900",
        "outbound request from command-line argument",
        Severity::Medium,
        Confidence::Medium,
    );
    let config = Config {
        sources: vec![Source {
            package: "os".to_owned(),
            name: "Args".to_owned(),
            pointer: false,
            is_function: false,
        }],
        sinks: vec![Sink {
            package: "net/http".to_owned(),
            receiver: String::new(),
            method: "Get".to_owned(),
            pointer: false,
            check_args: None,
            arg_type_guards: Default::default(),
        }],
        sanitizers: Vec::new(),
    };
    let ssa = SsaResult {
        program: pb.finish(),
        source_funcs: vec![func],
    };
    let issues = Analyzer::taint(rule, config).run(Some(&ssa)).expect("analysis runs");
    assert_eq!(issues.len(), 1, "reads of a declared global are sources");
}

#[test]
fn recursive_callee_terminates_and_propagates() {
    let mut pb = ProgramBuilder::new();
    let env = fixtures::http_env(&mut pb);
    pb.package("main", "main");

    // rec(s) returns either s or rec(s); the summary must survive the
    // self-referential call.
    let mut g = pb.function(
        "main",
        "rec",
        Signature::func(vec![Type::string()], vec![Type::string()]),
    );
    let s = g.param_id(0);
    let rec_id = g.id();
    let again = g.call(rec_id, vec![s]);
    let joined = g.phi(vec![s, again], Type::string());
    g.ret(vec![joined]);
    let rec = g.finish();

    let mut f = pb.function("main", "rec_handler", handler_sig(&env));
    let r = f.param_id(1);
    let key = f.const_str("url");
    let target = f.call(env.form_value, vec![r, key]);
    let walked = f.call(rec, vec![target]);
    f.call(env.http_get, vec![walked]);
    f.ret(Vec::new());
    let handler = f.finish();

    let ssa = SsaResult {
        program: pb.finish(),
        source_funcs: vec![rec, handler],
    };
    let issues = builtin("G704").run(Some(&ssa)).expect("analysis runs");
    assert_eq!(issues.len(), 1, "recursion must terminate with the finding intact");
}
