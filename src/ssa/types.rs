//! Go-style type model for SSA values.
//!
//! Named types carry nominal identity (package path + name) while every
//! other type compares structurally. Interfaces are structural method sets,
//! which is what the satisfaction check in the resolver relies on.

use std::fmt;
use std::sync::Arc;

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int64,
    Uint,
    Uint64,
    Float64,
    String,
    Byte,
    /// Placeholder for values whose type the builder could not determine.
    Invalid,
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: Type,
}

/// Parameter and result types of a method, without the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MethodSig {
    /// Parameter types in declaration order.
    pub params: Vec<Type>,
    /// Result types in declaration order.
    pub results: Vec<Type>,
}

/// A method declared on a named type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Method {
    /// Method name.
    pub name: String,
    /// Parameter/result types.
    pub sig: MethodSig,
    /// Whether the receiver is a pointer receiver.
    pub pointer_receiver: bool,
}

/// One method of an interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceMethod {
    /// Method name.
    pub name: String,
    /// Parameter/result types.
    pub sig: MethodSig,
}

/// A structural interface type. Methods are kept sorted by name so that
/// structurally equal interfaces compare equal regardless of declaration
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InterfaceType {
    methods: Vec<InterfaceMethod>,
}

impl InterfaceType {
    /// Creates an interface from its method list.
    #[must_use]
    pub fn new(mut methods: Vec<InterfaceMethod>) -> Self {
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        Self { methods }
    }

    /// The empty interface.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Methods sorted by name.
    #[must_use]
    pub fn methods(&self) -> &[InterfaceMethod] {
        &self.methods
    }
}

/// A named (declared) type: identity is `package.name`, but the underlying
/// type and declared method set travel along for structural checks.
#[derive(Debug, Clone)]
pub struct NamedType {
    /// Import path of the declaring package.
    pub package: String,
    /// Declared type name.
    pub name: String,
    /// Underlying type.
    pub underlying: Type,
    /// Methods declared on this type.
    pub methods: Vec<Method>,
}

impl PartialEq for NamedType {
    fn eq(&self, other: &Self) -> bool {
        // Nominal identity: two declarations of the same qualified name are
        // the same type.
        self.package == other.package && self.name == other.name
    }
}

impl Eq for NamedType {}

impl std::hash::Hash for NamedType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.package.hash(state);
        self.name.hash(state);
    }
}

/// Function signature, including an optional method receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    /// Receiver type for methods, `None` for plain functions.
    pub recv: Option<Type>,
    /// Parameter types.
    pub params: Vec<Type>,
    /// Result types.
    pub results: Vec<Type>,
    /// Whether the final parameter is variadic.
    pub variadic: bool,
}

impl Signature {
    /// A plain function signature.
    #[must_use]
    pub fn func(params: Vec<Type>, results: Vec<Type>) -> Self {
        Self {
            recv: None,
            params,
            results,
            variadic: false,
        }
    }

    /// A method signature with a receiver.
    #[must_use]
    pub fn method(recv: Type, params: Vec<Type>, results: Vec<Type>) -> Self {
        Self {
            recv: Some(recv),
            params,
            results,
            variadic: false,
        }
    }

    /// The single result type of this signature: the result itself for
    /// one-result functions, a tuple otherwise.
    #[must_use]
    pub fn result_type(&self) -> Type {
        match self.results.len() {
            0 => Type::Tuple(Vec::new()),
            1 => self.results[0].clone(),
            _ => Type::Tuple(self.results.clone()),
        }
    }
}

/// A Go-style type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Scalar type.
    Basic(BasicKind),
    /// Pointer to an element type.
    Pointer(Box<Type>),
    /// Slice of an element type.
    Slice(Box<Type>),
    /// Tuple of types (multi-result calls).
    Tuple(Vec<Type>),
    /// Struct with named fields.
    Struct(Vec<StructField>),
    /// Function signature type.
    Signature(Box<Signature>),
    /// Declared named type.
    Named(Arc<NamedType>),
    /// Anonymous structural interface.
    Interface(Arc<InterfaceType>),
}

impl Type {
    /// `string`.
    #[must_use]
    pub fn string() -> Self {
        Type::Basic(BasicKind::String)
    }

    /// `int`.
    #[must_use]
    pub fn int() -> Self {
        Type::Basic(BasicKind::Int)
    }

    /// `[]byte`.
    #[must_use]
    pub fn bytes() -> Self {
        Type::Slice(Box::new(Type::Basic(BasicKind::Byte)))
    }

    /// Pointer to `self`.
    #[must_use]
    pub fn pointer_to(self) -> Self {
        Type::Pointer(Box::new(self))
    }

    /// Slice of `self`.
    #[must_use]
    pub fn slice_of(self) -> Self {
        Type::Slice(Box::new(self))
    }

    /// A named type with no methods.
    #[must_use]
    pub fn named(package: &str, name: &str, underlying: Type) -> Self {
        Type::Named(Arc::new(NamedType {
            package: package.to_owned(),
            name: name.to_owned(),
            underlying,
            methods: Vec::new(),
        }))
    }

    /// A named type with declared methods.
    #[must_use]
    pub fn named_with_methods(
        package: &str,
        name: &str,
        underlying: Type,
        methods: Vec<Method>,
    ) -> Self {
        Type::Named(Arc::new(NamedType {
            package: package.to_owned(),
            name: name.to_owned(),
            underlying,
            methods,
        }))
    }

    /// A named interface type.
    #[must_use]
    pub fn named_interface(package: &str, name: &str, methods: Vec<InterfaceMethod>) -> Self {
        Type::named(
            package,
            name,
            Type::Interface(Arc::new(InterfaceType::new(methods))),
        )
    }

    /// The empty `interface{}`.
    #[must_use]
    pub fn any() -> Self {
        Type::Interface(Arc::new(InterfaceType::empty()))
    }

    /// Strips one level of pointer indirection, if present.
    #[must_use]
    pub fn strip_pointer(&self) -> &Type {
        match self {
            Type::Pointer(elem) => elem,
            other => other,
        }
    }

    /// The named-type info of `self`, without pointer stripping.
    #[must_use]
    pub fn as_named(&self) -> Option<&NamedType> {
        match self {
            Type::Named(named) => Some(named),
            _ => None,
        }
    }

    /// The element type a load through `self` produces, for addresses.
    #[must_use]
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(elem) => Some(elem),
            _ => None,
        }
    }

    /// The interface method set of `self`, if `self` is an interface or a
    /// named type whose underlying type is an interface.
    #[must_use]
    pub fn interface_methods(&self) -> Option<&[InterfaceMethod]> {
        match self {
            Type::Interface(iface) => Some(iface.methods()),
            Type::Named(named) => match &named.underlying {
                Type::Interface(iface) => Some(iface.methods()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether `self` is an interface (directly or via a named type).
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.interface_methods().is_some()
    }

    /// The method set of `self`: for `*T` all declared methods of `T`, for
    /// `T` only its value-receiver methods, for interfaces the interface
    /// methods themselves.
    #[must_use]
    pub fn method_set(&self) -> Vec<InterfaceMethod> {
        match self {
            Type::Pointer(elem) => match elem.as_ref() {
                Type::Named(named) => named
                    .methods
                    .iter()
                    .map(|m| InterfaceMethod {
                        name: m.name.clone(),
                        sig: m.sig.clone(),
                    })
                    .collect(),
                _ => Vec::new(),
            },
            Type::Named(named) => {
                if let Some(methods) = self.interface_methods() {
                    return methods.to_vec();
                }
                named
                    .methods
                    .iter()
                    .filter(|m| !m.pointer_receiver)
                    .map(|m| InterfaceMethod {
                        name: m.name.clone(),
                        sig: m.sig.clone(),
                    })
                    .collect()
            }
            Type::Interface(iface) => iface.methods().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Structural interface satisfaction: every method of `iface` must be
    /// present in the method set of `self` with an identical signature.
    #[must_use]
    pub fn implements(&self, iface: &[InterfaceMethod]) -> bool {
        if iface.is_empty() {
            return true;
        }
        let set = self.method_set();
        iface.iter().all(|required| {
            set.iter()
                .any(|m| m.name == required.name && m.sig == required.sig)
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic(kind) => write!(f, "{}", format!("{kind:?}").to_lowercase()),
            Type::Pointer(elem) => write!(f, "*{elem}"),
            Type::Slice(elem) => write!(f, "[]{elem}"),
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Type::Struct(_) => write!(f, "struct{{...}}"),
            Type::Signature(_) => write!(f, "func"),
            Type::Named(named) => write!(f, "{}.{}", named.package, named.name),
            Type::Interface(iface) if iface.methods().is_empty() => write!(f, "interface{{}}"),
            Type::Interface(_) => write!(f, "interface{{...}}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_method() -> InterfaceMethod {
        InterfaceMethod {
            name: "Write".to_owned(),
            sig: MethodSig {
                params: vec![Type::bytes()],
                results: vec![Type::int()],
            },
        }
    }

    #[test]
    fn named_identity_is_nominal() {
        let a = Type::named("net/http", "Request", Type::Struct(Vec::new()));
        let b = Type::named("net/http", "Request", Type::Struct(vec![StructField {
            name: "Body".to_owned(),
            ty: Type::any(),
        }]));
        assert_eq!(a, b, "same qualified name must compare equal");
        let c = Type::named("myapp/http", "Request", Type::Struct(Vec::new()));
        assert_ne!(a, c);
    }

    #[test]
    fn empty_interface_is_satisfied_by_anything() {
        assert!(Type::string().implements(&[]));
        assert!(Type::bytes().implements(&[]));
    }

    #[test]
    fn pointer_receiver_methods_only_in_pointer_method_set() {
        let file = Type::named_with_methods(
            "os",
            "File",
            Type::Struct(Vec::new()),
            vec![Method {
                name: "Write".to_owned(),
                sig: write_method().sig,
                pointer_receiver: true,
            }],
        );
        let iface = vec![write_method()];
        assert!(!file.implements(&iface), "value receiver lacks Write");
        assert!(file.clone().pointer_to().implements(&iface));
    }
}
