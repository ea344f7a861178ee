//! The interprocedural taint propagation engine.
//!
//! Taintedness of a value is decided by memoized DFS over its operand
//! graph, with the same cycle discipline as the dependency walker. Calls
//! with a statically known callee body are followed interprocedurally:
//! actual-argument taint is bound to the formal parameters and the callee's
//! return values are evaluated under that binding, cached per
//! `(callee, tainted-arg-mask)`. Calls that cannot be resolved, or whose
//! callee has no body, conservatively propagate taint from the callee value
//! and arguments to the result.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::dependency::MAX_DEPTH;
use crate::ssa::{CallCommon, FuncId, Program, ValueId, ValueKind};

use super::config::Config;
use super::resolver::is_context_type;
use super::sinks::matches_sanitizer;
use super::sources::is_source;

/// An evaluation context: which function body we are inside of, and which
/// of its formal parameters carry taint bound from the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameData {
    func: Option<FuncId>,
    mask: u64,
}

type FrameId = u32;

const ROOT_FRAME: FrameId = 0;

/// Per-run taint oracle over one program and one rule config.
///
/// All caches live inside the engine; a fresh engine per worker keeps the
/// parallel path free of shared mutable state.
pub struct TaintEngine<'a> {
    program: &'a Program,
    config: &'a Config,
    frames: Vec<FrameData>,
    frame_index: FxHashMap<(FuncId, u64), FrameId>,
    memo: FxHashMap<(ValueId, FrameId), bool>,
    visiting: FxHashSet<(ValueId, FrameId)>,
    summaries: FxHashMap<(FuncId, u64), bool>,
    active_summaries: FxHashSet<(FuncId, u64)>,
}

impl<'a> TaintEngine<'a> {
    /// Creates an engine for one analysis run.
    #[must_use]
    pub fn new(program: &'a Program, config: &'a Config) -> Self {
        Self {
            program,
            config,
            frames: vec![FrameData {
                func: None,
                mask: 0,
            }],
            frame_index: FxHashMap::default(),
            memo: FxHashMap::default(),
            visiting: FxHashSet::default(),
            summaries: FxHashMap::default(),
            active_summaries: FxHashSet::default(),
        }
    }

    /// Whether `value` is tainted in the function it belongs to.
    pub fn is_tainted(&mut self, value: ValueId) -> bool {
        self.tainted_in(value, ROOT_FRAME, 0)
    }

    fn tainted_in(&mut self, value: ValueId, frame: FrameId, depth: usize) -> bool {
        if depth > MAX_DEPTH {
            return false;
        }
        // Request-context handles never carry user payload, regardless of
        // where they were derived from.
        if is_context_type(self.program.type_of(value)) {
            return false;
        }

        let key = (value, frame);
        if let Some(&result) = self.memo.get(&key) {
            return result;
        }
        if self.visiting.contains(&key) {
            // Cycle re-entry proves nothing; do not memoize so another edge
            // of the outer traversal can still succeed.
            return false;
        }

        self.visiting.insert(key);
        let result = self.compute(value, frame, depth);
        self.visiting.remove(&key);
        self.memo.insert(key, result);

        result
    }

    fn compute(&mut self, value: ValueId, frame: FrameId, depth: usize) -> bool {
        if self.param_bound_tainted(value, frame) {
            return true;
        }
        if is_source(self.program, self.config, value) {
            return true;
        }

        let program = self.program;
        match &program.value(value).kind {
            ValueKind::ChangeType { x }
            | ValueKind::MakeInterface { x }
            | ValueKind::ChangeInterface { x }
            | ValueKind::TypeAssert { x }
            | ValueKind::UnOp { x, .. }
            | ValueKind::FieldAddr { x, .. }
            | ValueKind::Field { x, .. } => self.tainted_in(*x, frame, depth + 1),
            ValueKind::IndexAddr { x, index } | ValueKind::Index { x, index } => {
                self.tainted_in(*x, frame, depth + 1) || self.tainted_in(*index, frame, depth + 1)
            }
            ValueKind::Slice { x, low, high, max } => {
                self.tainted_in(*x, frame, depth + 1)
                    || [low, high, max]
                        .iter()
                        .filter_map(|slot| **slot)
                        .any(|bound| self.tainted_in(bound, frame, depth + 1))
            }
            ValueKind::Extract { tuple, .. } => self.tainted_in(*tuple, frame, depth + 1),
            ValueKind::Phi { edges } => edges
                .iter()
                .any(|&edge| self.tainted_in(edge, frame, depth + 1)),
            ValueKind::Call(call) => self.call_tainted(call, frame, depth),
            _ => false,
        }
    }

    /// Whether `value` is a formal parameter carrying taint bound from the
    /// call site that opened this frame.
    fn param_bound_tainted(&self, value: ValueId, frame: FrameId) -> bool {
        let FrameData {
            func: Some(func),
            mask,
        } = self.frames[frame as usize]
        else {
            return false;
        };
        if mask == 0 {
            return false;
        }
        let data = self.program.value(value);
        let ValueKind::Parameter { index } = data.kind else {
            return false;
        };
        data.parent == Some(func) && index < 64 && mask & (1 << index) != 0
    }

    fn call_tainted(&mut self, call: &CallCommon, frame: FrameId, depth: usize) -> bool {
        // A sanitizer's result is trusted no matter what flowed in.
        if matches_sanitizer(self.program, call, self.config) {
            return false;
        }

        match call.static_callee(self.program) {
            Some(callee) if self.program.func(callee).has_body() => {
                let mask = self.bind_argument_taint(callee, &call.args, frame, depth);
                self.callee_returns_taint(callee, mask, depth)
            }
            _ => {
                // Unknown or bodyless callee: the result is tainted when
                // anything flowing into the call is.
                self.tainted_in(call.callee_value(), frame, depth + 1)
                    || call
                        .args
                        .iter()
                        .any(|&arg| self.tainted_in(arg, frame, depth + 1))
            }
        }
    }

    /// Binds actual-argument taint onto the callee's formal parameters as a
    /// bitmask. Context-typed arguments never bind taint.
    fn bind_argument_taint(
        &mut self,
        callee: FuncId,
        args: &[ValueId],
        frame: FrameId,
        depth: usize,
    ) -> u64 {
        let param_count = self.program.func(callee).params.len();
        let mut mask = 0u64;
        for (index, &arg) in args.iter().enumerate().take(param_count.min(64)) {
            if self.tainted_in(arg, frame, depth + 1) {
                mask |= 1 << index;
            }
        }
        mask
    }

    /// Whether `callee` can return a tainted value when the formals in
    /// `mask` are tainted. Recursive call chains break at re-entry.
    fn callee_returns_taint(&mut self, callee: FuncId, mask: u64, depth: usize) -> bool {
        let key = (callee, mask);
        if let Some(&cached) = self.summaries.get(&key) {
            return cached;
        }
        if self.active_summaries.contains(&key) {
            return false;
        }

        self.active_summaries.insert(key);
        let frame = self.frame_for(callee, mask);
        let program = self.program;
        let mut result = false;
        for instr in program.func_instrs(callee) {
            if let ValueKind::Return { results } = &program.value(instr).kind {
                if results
                    .iter()
                    .any(|&ret| self.tainted_in(ret, frame, depth + 1))
                {
                    result = true;
                    break;
                }
            }
        }
        self.active_summaries.remove(&key);
        self.summaries.insert(key, result);
        trace!(
            callee = %self.program.func(callee).qualified_name(),
            mask,
            tainted = result,
            "computed callee taint summary"
        );

        result
    }

    fn frame_for(&mut self, func: FuncId, mask: u64) -> FrameId {
        if let Some(&frame) = self.frame_index.get(&(func, mask)) {
            return frame;
        }
        let frame = u32::try_from(self.frames.len()).expect("frame arena overflow");
        self.frames.push(FrameData {
            func: Some(func),
            mask,
        });
        self.frame_index.insert((func, mask), frame);
        frame
    }
}
