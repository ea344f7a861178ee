//! Call graph construction over SSA functions.
//!
//! Enumerates the call sites, closure constructions, and static call edges
//! of every function reachable from the analyzed source set. Interface
//! invocations appear as call sites without a static edge; their dynamic
//! targets stay unresolved.

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ssa::{FuncId, Program, ValueId, ValueKind};

/// Call-site and edge index for one analysis run.
#[derive(Debug)]
pub struct CallGraph {
    graph: DiGraphMap<FuncId, ()>,
    sites: FxHashMap<FuncId, Vec<ValueId>>,
    closures: FxHashMap<FuncId, Vec<ValueId>>,
    functions: Vec<FuncId>,
}

impl CallGraph {
    /// Builds the graph from the source-function roots: the roots, their
    /// nested anonymous functions, and every statically resolvable callee
    /// that has a body.
    #[must_use]
    pub fn build(program: &Program, roots: &[FuncId]) -> Self {
        let mut functions = Vec::new();
        let mut seen: FxHashSet<FuncId> = FxHashSet::default();
        let mut graph = DiGraphMap::new();
        let mut sites: FxHashMap<FuncId, Vec<ValueId>> = FxHashMap::default();
        let mut closures: FxHashMap<FuncId, Vec<ValueId>> = FxHashMap::default();

        let mut worklist: Vec<FuncId> = Vec::new();
        for &root in roots {
            if seen.insert(root) {
                worklist.push(root);
            }
        }

        while let Some(func) = worklist.pop() {
            functions.push(func);
            graph.add_node(func);

            for anon in &program.func(func).anon_funcs {
                if seen.insert(*anon) {
                    worklist.push(*anon);
                }
            }

            let mut func_sites = Vec::new();
            let mut func_closures = Vec::new();
            for instr in program.func_instrs(func) {
                match &program.value(instr).kind {
                    ValueKind::Call(call) => {
                        func_sites.push(instr);
                        if let Some(callee) = call.static_callee(program) {
                            graph.add_edge(func, callee, ());
                            if program.func(callee).has_body() && seen.insert(callee) {
                                worklist.push(callee);
                            }
                        }
                    }
                    ValueKind::MakeClosure { func: closure_fn, .. } => {
                        func_closures.push(instr);
                        graph.add_edge(func, *closure_fn, ());
                        if seen.insert(*closure_fn) {
                            worklist.push(*closure_fn);
                        }
                    }
                    _ => {}
                }
            }
            sites.insert(func, func_sites);
            closures.insert(func, func_closures);
        }

        // Discovery follows a LIFO worklist; sort for a stable scan order.
        functions.sort_unstable();

        Self {
            graph,
            sites,
            closures,
            functions,
        }
    }

    /// Every function in the analyzed universe, in stable order.
    #[must_use]
    pub fn functions(&self) -> &[FuncId] {
        &self.functions
    }

    /// Call instructions inside `func`, in body order.
    #[must_use]
    pub fn call_sites(&self, func: FuncId) -> &[ValueId] {
        self.sites.get(&func).map_or(&[], Vec::as_slice)
    }

    /// `MakeClosure` instructions inside `func`, in body order.
    #[must_use]
    pub fn closure_sites(&self, func: FuncId) -> &[ValueId] {
        self.closures.get(&func).map_or(&[], Vec::as_slice)
    }

    /// Whether a static call edge `caller -> callee` exists.
    #[must_use]
    pub fn calls(&self, caller: FuncId, callee: FuncId) -> bool {
        self.graph.contains_edge(caller, callee)
    }

    /// Functions reachable from `root` over static edges, `root` included.
    #[must_use]
    pub fn reachable_from(&self, root: FuncId) -> FxHashSet<FuncId> {
        let mut reachable = FxHashSet::default();
        if !self.graph.contains_node(root) {
            return reachable;
        }
        let mut dfs = Dfs::new(&self.graph, root);
        while let Some(node) = dfs.next(&self.graph) {
            reachable.insert(node);
        }
        reachable
    }
}
