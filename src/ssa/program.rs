//! SSA program representation.
//!
//! A `Program` is a frozen arena of packages, functions, and value nodes.
//! Values carry their instruction kind, static type, and source position;
//! identity is the arena index, which is what every memoization cache keys
//! on. The program is immutable once analysis starts; the mutation methods
//! here exist for the SSA builder collaborator and the test harness.

use rustc_hash::FxHashMap;

use super::types::{Signature, Type};

/// Identity of a value node within a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

/// Identity of a function within a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// A resolved source position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// Source file path.
    pub file: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

/// A top-level member of a package scope.
#[derive(Debug, Clone)]
pub enum Member {
    /// A declared type name.
    Type(Type),
    /// A package-level function.
    Func(FuncId),
    /// A package-level variable.
    Global(ValueId),
    /// A package-level constant.
    Const(ValueId),
}

/// A package: import path, short name, and top-level scope.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Import path, e.g. `net/http`.
    pub path: String,
    /// Short package name, e.g. `http`.
    pub name: String,
    /// Top-level members keyed by declared name.
    pub members: FxHashMap<String, Member>,
}

impl Package {
    /// Looks up a declared type by name. Returns `None` when the member is
    /// absent or is not a type name (a var, const, or func).
    #[must_use]
    pub fn type_member(&self, name: &str) -> Option<&Type> {
        match self.members.get(name) {
            Some(Member::Type(ty)) => Some(ty),
            _ => None,
        }
    }
}

/// Dereference-style unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOpKind {
    /// Pointer load (`*addr`).
    Deref,
    /// Arithmetic/logical unary op; operand flow is what matters here.
    Other,
}

/// The callee part of a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// Call mode: the callee is itself an SSA value. Static when that value
    /// names a function, dynamic otherwise (closure in a variable, function
    /// parameter).
    Value(ValueId),
    /// Invoke mode: a method call through an interface receiver.
    Invoke {
        /// Interface receiver value.
        recv: ValueId,
        /// Method name on the interface.
        method: String,
    },
}

/// A call site: callee plus arguments. In call mode a method receiver is
/// passed as the first argument; in invoke mode the receiver is separate
/// and `args` holds only the declared parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallCommon {
    /// The callee.
    pub target: CallTarget,
    /// Argument values.
    pub args: Vec<ValueId>,
}

impl CallCommon {
    /// The value that stands for the callee in dataflow terms: the callee
    /// value in call mode, the receiver in invoke mode.
    #[must_use]
    pub fn callee_value(&self) -> ValueId {
        match &self.target {
            CallTarget::Value(v) => *v,
            CallTarget::Invoke { recv, .. } => *recv,
        }
    }

    /// Resolves the statically known callee, if any: a direct reference to
    /// a function, or a closure constructed at the call site.
    #[must_use]
    pub fn static_callee(&self, program: &Program) -> Option<FuncId> {
        let CallTarget::Value(callee) = &self.target else {
            return None;
        };
        match &program.value(*callee).kind {
            ValueKind::FuncRef { func } => Some(*func),
            ValueKind::MakeClosure { func, .. } => Some(*func),
            _ => None,
        }
    }
}

/// Instruction/value kinds. Nodes that produce no value (`Store`, `Return`)
/// still live in the arena so call graphs and protection analysis can walk
/// a single instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// Function formal parameter.
    Parameter {
        /// Zero-based position in the parameter list.
        index: usize,
    },
    /// Captured closure variable.
    FreeVar {
        /// Zero-based position in the free-variable list.
        index: usize,
    },
    /// Package-level variable; the value is its address.
    Global {
        /// Declaring package path.
        package: String,
        /// Declared name.
        name: String,
    },
    /// Compile-time constant. `None` means the zero value / nil.
    Const {
        /// Literal rendering, when known.
        literal: Option<String>,
    },
    /// Local allocation cell; the value is its address.
    Alloc,
    /// A function used as a first-class value.
    FuncRef {
        /// The referenced function.
        func: FuncId,
    },
    /// Unary operation, notably pointer load.
    UnOp {
        /// Operand.
        x: ValueId,
        /// Operation class.
        op: UnOpKind,
    },
    /// Address of a struct field.
    FieldAddr {
        /// Struct address operand.
        x: ValueId,
        /// Field index.
        field: usize,
        /// Field name, for diagnostics.
        field_name: String,
    },
    /// Value of a struct field.
    Field {
        /// Struct operand.
        x: ValueId,
        /// Field index.
        field: usize,
        /// Field name, for diagnostics.
        field_name: String,
    },
    /// Address of an array/slice element.
    IndexAddr {
        /// Aggregate operand.
        x: ValueId,
        /// Index operand.
        index: ValueId,
    },
    /// Value of an array element.
    Index {
        /// Aggregate operand.
        x: ValueId,
        /// Index operand.
        index: ValueId,
    },
    /// Sub-slice of an aggregate.
    Slice {
        /// Aggregate operand.
        x: ValueId,
        /// Optional low bound.
        low: Option<ValueId>,
        /// Optional high bound.
        high: Option<ValueId>,
        /// Optional capacity bound.
        max: Option<ValueId>,
    },
    /// The i-th component of a tuple-valued instruction.
    Extract {
        /// Tuple operand.
        tuple: ValueId,
        /// Component index.
        index: usize,
    },
    /// SSA join, one edge per predecessor block.
    Phi {
        /// Incoming edges.
        edges: Vec<ValueId>,
    },
    /// Function or method call.
    Call(CallCommon),
    /// Box a concrete value into an interface.
    MakeInterface {
        /// Boxed operand.
        x: ValueId,
    },
    /// Convert between interface types.
    ChangeInterface {
        /// Operand.
        x: ValueId,
    },
    /// Representation-preserving type conversion.
    ChangeType {
        /// Operand.
        x: ValueId,
    },
    /// Type assertion on an interface value.
    TypeAssert {
        /// Operand.
        x: ValueId,
    },
    /// Construct a closure over a function and its free-variable bindings.
    MakeClosure {
        /// The closure body.
        func: FuncId,
        /// Bound values, one per free variable of `func`.
        bindings: Vec<ValueId>,
    },
    /// Write `val` through the address `addr`. Produces no value.
    Store {
        /// Destination address.
        addr: ValueId,
        /// Stored value.
        val: ValueId,
    },
    /// Return from the enclosing function. Produces no value.
    Return {
        /// Result values.
        results: Vec<ValueId>,
    },
}

/// A value node: kind, static type, owner, position.
#[derive(Debug, Clone)]
pub struct ValueData {
    /// Instruction kind and operands.
    pub kind: ValueKind,
    /// Static type of the produced value; an empty tuple for instructions
    /// that produce none.
    pub ty: Type,
    /// The function this node belongs to, when it is part of a body.
    pub parent: Option<FuncId>,
    /// Source position, when resolved.
    pub pos: Option<Position>,
}

/// A basic block: an ordered instruction stream.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    /// Instructions in execution order.
    pub instrs: Vec<ValueId>,
}

/// A function: signature, formals, body, and nested anonymous functions.
#[derive(Debug, Clone)]
pub struct Function {
    /// Arena identity.
    pub id: FuncId,
    /// Declaring package path.
    pub package: String,
    /// Short name, e.g. `MaxBytesReader` or `handler$1`.
    pub name: String,
    /// Full signature including any receiver.
    pub signature: Signature,
    /// Parameter values, one per signature parameter (receiver first for
    /// methods, matching call-mode argument layout).
    pub params: Vec<ValueId>,
    /// Free-variable values for closures.
    pub free_vars: Vec<ValueId>,
    /// Body blocks; empty for declared externals.
    pub blocks: Vec<BasicBlock>,
    /// Anonymous functions defined inside this one.
    pub anon_funcs: Vec<FuncId>,
    /// The `FuncRef` value standing for this function.
    pub func_value: ValueId,
    /// Declaration position.
    pub pos: Option<Position>,
}

impl Function {
    /// Whether this function has a body to analyze.
    #[must_use]
    pub fn has_body(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// Qualified `package.name` for diagnostics.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.package, self.name)
    }
}

/// A whole SSA program.
#[derive(Debug, Default)]
pub struct Program {
    packages: Vec<Package>,
    package_index: FxHashMap<String, usize>,
    funcs: Vec<Function>,
    values: Vec<ValueData>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a package. Re-registering an existing path returns the
    /// existing package unchanged.
    pub fn create_package(&mut self, path: &str, name: &str) {
        if self.package_index.contains_key(path) {
            return;
        }
        self.package_index.insert(path.to_owned(), self.packages.len());
        self.packages.push(Package {
            path: path.to_owned(),
            name: name.to_owned(),
            members: FxHashMap::default(),
        });
    }

    /// All packages of the program.
    #[must_use]
    pub fn all_packages(&self) -> &[Package] {
        &self.packages
    }

    /// Looks up a package by import path.
    #[must_use]
    pub fn package_by_path(&self, path: &str) -> Option<&Package> {
        self.package_index.get(path).map(|&i| &self.packages[i])
    }

    /// Inserts a declared type into a package scope, creating the package
    /// if needed.
    pub fn insert_type_member(&mut self, package: &str, name: &str, ty: Type) {
        self.ensure_package(package);
        let idx = self.package_index[package];
        self.packages[idx]
            .members
            .insert(name.to_owned(), Member::Type(ty));
    }

    /// Registers a package-level variable and returns its address value.
    pub fn add_global(&mut self, package: &str, name: &str, ty: Type) -> ValueId {
        self.ensure_package(package);
        let id = self.add_value(ValueData {
            kind: ValueKind::Global {
                package: package.to_owned(),
                name: name.to_owned(),
            },
            ty: ty.pointer_to(),
            parent: None,
            pos: None,
        });
        let idx = self.package_index[package];
        self.packages[idx]
            .members
            .insert(name.to_owned(), Member::Global(id));
        id
    }

    /// Declares a function and its `FuncRef` value. The body starts empty;
    /// externals stay that way.
    pub fn declare_function(&mut self, package: &str, name: &str, signature: Signature) -> FuncId {
        self.ensure_package(package);
        let id = FuncId(u32::try_from(self.funcs.len()).expect("function arena overflow"));
        let func_value = self.add_value(ValueData {
            kind: ValueKind::FuncRef { func: id },
            ty: Type::Signature(Box::new(signature.clone())),
            parent: None,
            pos: None,
        });
        let mut params = Vec::new();
        let mut param_types: Vec<Type> = Vec::new();
        if let Some(recv) = &signature.recv {
            param_types.push(recv.clone());
        }
        param_types.extend(signature.params.iter().cloned());
        for (index, ty) in param_types.into_iter().enumerate() {
            params.push(self.add_value(ValueData {
                kind: ValueKind::Parameter { index },
                ty,
                parent: Some(id),
                pos: None,
            }));
        }
        self.funcs.push(Function {
            id,
            package: package.to_owned(),
            name: name.to_owned(),
            signature,
            params,
            free_vars: Vec::new(),
            blocks: Vec::new(),
            anon_funcs: Vec::new(),
            func_value,
            pos: None,
        });
        let idx = self.package_index[package];
        self.packages[idx]
            .members
            .insert(name.to_owned(), Member::Func(id));
        id
    }

    /// Adds a value node to the arena.
    pub fn add_value(&mut self, data: ValueData) -> ValueId {
        let id = ValueId(u32::try_from(self.values.len()).expect("value arena overflow"));
        self.values.push(data);
        id
    }

    /// The value node for `id`.
    #[must_use]
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.0 as usize]
    }

    /// Mutable access to a value node.
    pub fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        &mut self.values[id.0 as usize]
    }

    /// The static type of `id`.
    #[must_use]
    pub fn type_of(&self, id: ValueId) -> &Type {
        &self.values[id.0 as usize].ty
    }

    /// The function for `id`.
    #[must_use]
    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.0 as usize]
    }

    /// Mutable access to a function.
    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.funcs[id.0 as usize]
    }

    /// All functions of the program.
    pub fn all_functions(&self) -> impl Iterator<Item = &Function> {
        self.funcs.iter()
    }

    /// Iterates the instruction stream of a function body.
    pub fn func_instrs(&self, id: FuncId) -> impl Iterator<Item = ValueId> + '_ {
        self.func(id)
            .blocks
            .iter()
            .flat_map(|block| block.instrs.iter().copied())
    }

    fn ensure_package(&mut self, path: &str) {
        if !self.package_index.contains_key(path) {
            let name = path.rsplit('/').next().unwrap_or(path).to_owned();
            let idx = self.packages.len();
            self.package_index.insert(path.to_owned(), idx);
            self.packages.push(Package {
                path: path.to_owned(),
                name,
                members: FxHashMap::default(),
            });
        }
    }
}
