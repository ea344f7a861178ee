//! Call-graph construction: site enumeration, static edges, closures, and
//! reachability.

use taintflow::ssa::{Signature, Type};
use taintflow::taint::CallGraph;
use taintflow::test_utils::{fixtures, ProgramBuilder};

#[test]
fn static_edges_and_reachability() {
    let mut pb = ProgramBuilder::new();
    pb.package("main", "main");

    let mut c = pb.function("main", "leaf", Signature::func(Vec::new(), Vec::new()));
    c.ret(Vec::new());
    let leaf = c.finish();

    let mut b = pb.function("main", "middle", Signature::func(Vec::new(), Vec::new()));
    b.call(leaf, vec![]);
    b.ret(Vec::new());
    let middle = b.finish();

    let mut a = pb.function("main", "entry", Signature::func(Vec::new(), Vec::new()));
    a.call(middle, vec![]);
    a.ret(Vec::new());
    let entry = a.finish();

    let mut other = pb.function("main", "island", Signature::func(Vec::new(), Vec::new()));
    other.ret(Vec::new());
    let island = other.finish();

    let program = pb.finish();
    let graph = CallGraph::build(&program, &[entry, island]);

    assert!(graph.calls(entry, middle));
    assert!(graph.calls(middle, leaf));
    assert!(!graph.calls(entry, leaf), "edges are direct, not transitive");

    let reachable = graph.reachable_from(entry);
    assert!(reachable.contains(&entry) && reachable.contains(&middle) && reachable.contains(&leaf));
    assert!(!reachable.contains(&island));

    // Callees with bodies join the universe even when not listed as roots.
    assert!(graph.functions().contains(&middle));
    assert!(graph.functions().contains(&leaf));
    assert_eq!(graph.call_sites(entry).len(), 1);
    assert!(graph.call_sites(island).is_empty());
}

#[test]
fn closures_and_invoke_sites_are_enumerated() {
    let mut pb = ProgramBuilder::new();
    let env = fixtures::http_env(&mut pb);
    pb.package("main", "main");

    let mut c = pb.function(
        "main",
        "outer$1",
        Signature::func(Vec::new(), Vec::new()),
    );
    let captured = c.free_var(env.handler.clone());
    let writer = c.const_nil(env.response_writer.clone());
    let request = c.const_nil(env.request.clone().pointer_to());
    c.invoke(captured, "ServeHTTP", vec![writer, request], Type::Tuple(Vec::new()));
    c.ret(Vec::new());
    let closure = c.finish();

    let mut o = pb.function(
        "main",
        "outer",
        Signature::func(vec![env.handler.clone()], Vec::new()),
    );
    let h = o.param_id(0);
    o.make_closure(closure, vec![h]);
    o.ret(Vec::new());
    let outer = o.finish();

    let program = pb.finish();
    let graph = CallGraph::build(&program, &[outer]);

    assert_eq!(graph.closure_sites(outer).len(), 1);
    assert!(
        graph.functions().contains(&closure),
        "closure bodies join the universe through MakeClosure"
    );
    assert_eq!(
        graph.call_sites(closure).len(),
        1,
        "invoke-mode sites are enumerated even without a static callee"
    );
    assert!(graph.calls(outer, closure));
}
