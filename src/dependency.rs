//! SSA value graph walker.
//!
//! Answers "does value A transitively derive from value B?" with memoized,
//! cycle-safe depth-first search over instruction operands. Both the taint
//! propagator and the form-parsing protection analyzer walk values through
//! this checker.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::ssa::{Program, ValueId, ValueKind};

/// Recursion bound for all SSA value-graph traversals. Overflow is treated
/// as "no dependency" rather than an error.
pub const MAX_DEPTH: usize = 32;

/// Memoized dependency checker over a single program.
///
/// Caches are scoped to one analysis run; a fresh checker is cheap to
/// construct per worker.
pub struct DependencyChecker<'a> {
    program: &'a Program,
    memo: FxHashMap<(ValueId, ValueId), bool>,
    visiting: FxHashSet<(ValueId, ValueId)>,
}

impl<'a> DependencyChecker<'a> {
    /// Creates a checker for `program`.
    #[must_use]
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            memo: FxHashMap::default(),
            visiting: FxHashSet::default(),
        }
    }

    /// Whether `value` transitively uses `target` as an operand.
    pub fn depends_on(&mut self, value: ValueId, target: ValueId) -> bool {
        self.depends_on_depth(value, target, 0)
    }

    fn depends_on_depth(&mut self, value: ValueId, target: ValueId, depth: usize) -> bool {
        if depth > MAX_DEPTH {
            return false;
        }
        if value == target {
            return true;
        }

        let key = (value, target);
        if let Some(&result) = self.memo.get(&key) {
            return result;
        }
        // Re-entry through a phi cycle: this path proves nothing, but the
        // outer traversal may still succeed through another edge, so the
        // negative answer must not be memoized.
        if self.visiting.contains(&key) {
            return false;
        }

        self.visiting.insert(key);
        let result = self
            .operands(value)
            .iter()
            .any(|&operand| self.depends_on_depth(operand, target, depth + 1));
        self.visiting.remove(&key);
        self.memo.insert(key, result);

        result
    }

    /// Operand set contributing to dataflow, per instruction kind. Leaf
    /// values (parameters, constants, globals, allocs, function refs)
    /// contribute nothing.
    fn operands(&self, value: ValueId) -> SmallVec<[ValueId; 4]> {
        let mut ops = SmallVec::new();
        match &self.program.value(value).kind {
            ValueKind::ChangeType { x }
            | ValueKind::MakeInterface { x }
            | ValueKind::ChangeInterface { x }
            | ValueKind::TypeAssert { x }
            | ValueKind::UnOp { x, .. }
            | ValueKind::FieldAddr { x, .. }
            | ValueKind::Field { x, .. } => ops.push(*x),
            ValueKind::IndexAddr { x, index } | ValueKind::Index { x, index } => {
                ops.push(*x);
                ops.push(*index);
            }
            ValueKind::Slice { x, low, high, max } => {
                ops.push(*x);
                ops.extend([low, high, max].into_iter().filter_map(|slot| *slot));
            }
            ValueKind::Extract { tuple, .. } => ops.push(*tuple),
            ValueKind::Phi { edges } => ops.extend(edges.iter().copied()),
            ValueKind::Call(call) => {
                // The callee expression itself is a dependency; this is what
                // captures higher-order flow of handlers through wrappers.
                ops.push(call.callee_value());
                ops.extend(call.args.iter().copied());
            }
            _ => {}
        }
        ops
    }
}
