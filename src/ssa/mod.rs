//! SSA intermediate representation consumed by the analyzers.
//!
//! The program graph is built elsewhere (the SSA builder collaborator, or
//! the test harness) and is read-only during analysis.

/// Program, package, function, and value arenas.
pub mod program;
/// Go-style type model: named types, interfaces, signatures.
pub mod types;

pub use program::{
    BasicBlock, CallCommon, CallTarget, FuncId, Function, Member, Package, Position, Program,
    UnOpKind, ValueData, ValueId, ValueKind,
};
pub use types::{
    BasicKind, InterfaceMethod, InterfaceType, Method, MethodSig, NamedType, Signature,
    StructField, Type,
};
