//! Builders for assembling SSA programs by hand.
//!
//! The production SSA graph comes from the out-of-scope builder
//! collaborator; tests assemble small programs through these helpers
//! instead. Instructions receive synthetic, strictly increasing source
//! positions per function so that position-keyed deduplication behaves the
//! way it does on real programs.

use crate::ssa::{
    BasicBlock, CallCommon, CallTarget, FuncId, Position, Program, Signature, Type, UnOpKind,
    ValueData, ValueId, ValueKind,
};

/// Incrementally builds a `Program`.
#[derive(Default)]
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a package.
    pub fn package(&mut self, path: &str, name: &str) {
        self.program.create_package(path, name);
    }

    /// Registers a declared type in a package scope.
    pub fn register_type(&mut self, package: &str, name: &str, ty: Type) {
        self.program.insert_type_member(package, name, ty);
    }

    /// Registers a package-level variable and returns its address.
    pub fn global(&mut self, package: &str, name: &str, ty: Type) -> ValueId {
        self.program.add_global(package, name, ty)
    }

    /// Declares an external function (no body).
    pub fn declare_func(&mut self, package: &str, name: &str, signature: Signature) -> FuncId {
        self.program.declare_function(package, name, signature)
    }

    /// Opens a builder for a function with a body.
    pub fn function(&mut self, package: &str, name: &str, signature: Signature) -> FunctionBuilder<'_> {
        let func = self.program.declare_function(package, name, signature);
        self.program.func_mut(func).blocks.push(BasicBlock::default());
        let file = format!("{package}/{name}.go");
        FunctionBuilder {
            program: &mut self.program,
            func,
            file,
            next_line: 1,
        }
    }

    /// Records `child` as an anonymous function nested in `parent`.
    pub fn mark_anon(&mut self, parent: FuncId, child: FuncId) {
        self.program.func_mut(parent).anon_funcs.push(child);
    }

    /// Finalizes the program.
    #[must_use]
    pub fn finish(self) -> Program {
        self.program
    }

    /// Read access while building, for assertions on intermediate state.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }
}

/// Appends instructions to one function body.
pub struct FunctionBuilder<'p> {
    program: &'p mut Program,
    func: FuncId,
    file: String,
    next_line: usize,
}

impl FunctionBuilder<'_> {
    /// The function under construction.
    #[must_use]
    pub fn id(&self) -> FuncId {
        self.func
    }

    /// The i-th parameter value (receiver first for methods).
    #[must_use]
    pub fn param_id(&self, index: usize) -> ValueId {
        self.program.func(self.func).params[index]
    }

    /// The first-class value of a declared function, for passing functions
    /// as arguments.
    #[must_use]
    pub fn func_ref(&self, func: FuncId) -> ValueId {
        self.program.func(func).func_value
    }

    /// Appends a free variable of the given type.
    pub fn free_var(&mut self, ty: Type) -> ValueId {
        let index = self.program.func(self.func).free_vars.len();
        let id = self.program.add_value(ValueData {
            kind: ValueKind::FreeVar { index },
            ty,
            parent: Some(self.func),
            pos: None,
        });
        self.program.func_mut(self.func).free_vars.push(id);
        id
    }

    /// Starts a new basic block; subsequent instructions append to it.
    pub fn block(&mut self) {
        self.program
            .func_mut(self.func)
            .blocks
            .push(BasicBlock::default());
    }

    fn next_pos(&mut self) -> Position {
        let pos = Position {
            file: self.file.clone(),
            line: self.next_line,
            column: 1,
        };
        self.next_line += 1;
        pos
    }

    fn push(&mut self, kind: ValueKind, ty: Type) -> ValueId {
        let pos = self.next_pos();
        let id = self.program.add_value(ValueData {
            kind,
            ty,
            parent: Some(self.func),
            pos: Some(pos),
        });
        self.program
            .func_mut(self.func)
            .blocks
            .last_mut()
            .expect("function builder always has an open block")
            .instrs
            .push(id);
        id
    }

    /// A string constant. Constants are pure values, not instructions.
    pub fn const_str(&mut self, literal: &str) -> ValueId {
        self.program.add_value(ValueData {
            kind: ValueKind::Const {
                literal: Some(literal.to_owned()),
            },
            ty: Type::string(),
            parent: Some(self.func),
            pos: None,
        })
    }

    /// An integer constant.
    pub fn const_int(&mut self, literal: i64) -> ValueId {
        self.program.add_value(ValueData {
            kind: ValueKind::Const {
                literal: Some(literal.to_string()),
            },
            ty: Type::int(),
            parent: Some(self.func),
            pos: None,
        })
    }

    /// A typed nil/zero constant.
    pub fn const_nil(&mut self, ty: Type) -> ValueId {
        self.program.add_value(ValueData {
            kind: ValueKind::Const { literal: None },
            ty,
            parent: Some(self.func),
            pos: None,
        })
    }

    /// A local allocation cell holding a `ty`; the value is its address.
    pub fn alloc(&mut self, ty: Type) -> ValueId {
        self.push(ValueKind::Alloc, ty.pointer_to())
    }

    /// Address of field `field` of the struct behind `x`.
    pub fn field_addr(&mut self, x: ValueId, field: usize, name: &str, field_ty: Type) -> ValueId {
        self.push(
            ValueKind::FieldAddr {
                x,
                field,
                field_name: name.to_owned(),
            },
            field_ty.pointer_to(),
        )
    }

    /// Value of field `field` of struct value `x`.
    pub fn field(&mut self, x: ValueId, field: usize, name: &str, field_ty: Type) -> ValueId {
        self.push(
            ValueKind::Field {
                x,
                field,
                field_name: name.to_owned(),
            },
            field_ty,
        )
    }

    /// Load through an address.
    pub fn load(&mut self, addr: ValueId) -> ValueId {
        let ty = self
            .program
            .type_of(addr)
            .pointee()
            .cloned()
            .unwrap_or(Type::Basic(crate::ssa::BasicKind::Invalid));
        self.push(ValueKind::UnOp { x: addr, op: UnOpKind::Deref }, ty)
    }

    /// Element value of an aggregate.
    pub fn index(&mut self, x: ValueId, index: ValueId, ty: Type) -> ValueId {
        self.push(ValueKind::Index { x, index }, ty)
    }

    /// Element address of an aggregate.
    pub fn index_addr(&mut self, x: ValueId, index: ValueId, elem_ty: Type) -> ValueId {
        self.push(ValueKind::IndexAddr { x, index }, elem_ty.pointer_to())
    }

    /// Sub-slice of an aggregate.
    pub fn slice(
        &mut self,
        x: ValueId,
        low: Option<ValueId>,
        high: Option<ValueId>,
        max: Option<ValueId>,
    ) -> ValueId {
        let ty = self.program.type_of(x).clone();
        self.push(ValueKind::Slice { x, low, high, max }, ty)
    }

    /// The i-th component of a tuple-valued instruction.
    pub fn extract(&mut self, tuple: ValueId, index: usize) -> ValueId {
        let ty = match self.program.type_of(tuple) {
            Type::Tuple(elems) => elems
                .get(index)
                .cloned()
                .unwrap_or(Type::Basic(crate::ssa::BasicKind::Invalid)),
            other => other.clone(),
        };
        self.push(ValueKind::Extract { tuple, index }, ty)
    }

    /// An SSA join. Edges may be patched later for cycles.
    pub fn phi(&mut self, edges: Vec<ValueId>, ty: Type) -> ValueId {
        self.push(ValueKind::Phi { edges }, ty)
    }

    /// Replaces the edges of a previously created phi.
    pub fn set_phi_edges(&mut self, phi: ValueId, edges: Vec<ValueId>) {
        let data = self.program.value_mut(phi);
        let ValueKind::Phi { edges: slot } = &mut data.kind else {
            panic!("set_phi_edges target is not a phi");
        };
        *slot = edges;
    }

    /// Call-mode call of a statically known function. The result type comes
    /// from the callee signature.
    pub fn call(&mut self, callee: FuncId, args: Vec<ValueId>) -> ValueId {
        let target = self.program.func(callee);
        let ty = target.signature.result_type();
        let callee_value = target.func_value;
        self.push(
            ValueKind::Call(CallCommon {
                target: CallTarget::Value(callee_value),
                args,
            }),
            ty,
        )
    }

    /// Call-mode call through an arbitrary callee value (closure variable,
    /// function parameter).
    pub fn call_value(&mut self, callee: ValueId, args: Vec<ValueId>, ty: Type) -> ValueId {
        self.push(
            ValueKind::Call(CallCommon {
                target: CallTarget::Value(callee),
                args,
            }),
            ty,
        )
    }

    /// Invoke-mode method call through an interface receiver.
    pub fn invoke(&mut self, recv: ValueId, method: &str, args: Vec<ValueId>, ty: Type) -> ValueId {
        self.push(
            ValueKind::Call(CallCommon {
                target: CallTarget::Invoke {
                    recv,
                    method: method.to_owned(),
                },
                args,
            }),
            ty,
        )
    }

    /// Boxes a concrete value into an interface type.
    pub fn make_interface(&mut self, x: ValueId, iface: Type) -> ValueId {
        self.push(ValueKind::MakeInterface { x }, iface)
    }

    /// Representation-preserving conversion.
    pub fn change_type(&mut self, x: ValueId, ty: Type) -> ValueId {
        self.push(ValueKind::ChangeType { x }, ty)
    }

    /// Interface-to-interface conversion.
    pub fn change_interface(&mut self, x: ValueId, ty: Type) -> ValueId {
        self.push(ValueKind::ChangeInterface { x }, ty)
    }

    /// Type assertion.
    pub fn type_assert(&mut self, x: ValueId, ty: Type) -> ValueId {
        self.push(ValueKind::TypeAssert { x }, ty)
    }

    /// Constructs a closure over `func` with the given bindings.
    pub fn make_closure(&mut self, func: FuncId, bindings: Vec<ValueId>) -> ValueId {
        let ty = Type::Signature(Box::new(self.program.func(func).signature.clone()));
        self.push(ValueKind::MakeClosure { func, bindings }, ty)
    }

    /// Stores `val` through `addr`.
    pub fn store(&mut self, addr: ValueId, val: ValueId) {
        self.push(ValueKind::Store { addr, val }, Type::Tuple(Vec::new()));
    }

    /// Returns from the function.
    pub fn ret(&mut self, results: Vec<ValueId>) {
        self.push(ValueKind::Return { results }, Type::Tuple(Vec::new()));
    }

    /// Closes the builder.
    pub fn finish(self) -> FuncId {
        self.func
    }
}

/// Shared standard-library shapes for tests: the `net/http` surface, the
/// `context` package, and the handful of functions the built-in rules talk
/// about.
pub mod fixtures {
    use super::ProgramBuilder;
    use crate::ssa::{FuncId, InterfaceMethod, Method, MethodSig, Signature, Type};

    /// Handles to the declared standard-library types and functions.
    pub struct HttpEnv {
        /// `net/http.Request` (the named type, not the pointer).
        pub request: Type,
        /// `net/http.ResponseWriter`.
        pub response_writer: Type,
        /// `net/http.Handler`.
        pub handler: Type,
        /// `net/http.HandlerFunc`.
        pub handler_func: Type,
        /// `context.Context`.
        pub context: Type,
        /// `net/url.URL`.
        pub url: Type,
        /// `net/url.Values`.
        pub url_values: Type,
        /// `net/http.MaxBytesReader`.
        pub max_bytes_reader: FuncId,
        /// `net/http.HandlerFunc.ServeHTTP` (call-mode method).
        pub handler_func_serve_http: FuncId,
        /// `(*net/http.Request).ParseForm`.
        pub parse_form: FuncId,
        /// `(*net/http.Request).ParseMultipartForm`.
        pub parse_multipart_form: FuncId,
        /// `(*net/http.Request).FormValue`.
        pub form_value: FuncId,
        /// `(*net/http.Request).PostFormValue`.
        pub post_form_value: FuncId,
        /// `(*net/http.Request).Context`.
        pub request_context: FuncId,
        /// `(*net/url.URL).Query`.
        pub url_query: FuncId,
        /// `net/url.Values.Get`.
        pub values_get: FuncId,
        /// `fmt.Fprintf`.
        pub fprintf: FuncId,
        /// `net/http.Get`.
        pub http_get: FuncId,
        /// `net/http.Post`.
        pub http_post: FuncId,
        /// `net/http.NewRequestWithContext`.
        pub new_request_with_context: FuncId,
        /// `os.Getenv`.
        pub os_getenv: FuncId,
        /// `html.EscapeString`.
        pub html_escape_string: FuncId,
        /// `encoding/json.Marshal`.
        pub json_marshal: FuncId,
        /// `strconv.Atoi`.
        pub strconv_atoi: FuncId,
        /// `strconv.Itoa`.
        pub strconv_itoa: FuncId,
    }

    /// The method set of `net/http.ResponseWriter`.
    fn response_writer_methods() -> Vec<InterfaceMethod> {
        vec![
            InterfaceMethod {
                name: "Header".to_owned(),
                sig: MethodSig::default(),
            },
            InterfaceMethod {
                name: "Write".to_owned(),
                sig: MethodSig {
                    params: vec![Type::bytes()],
                    results: vec![Type::int()],
                },
            },
            InterfaceMethod {
                name: "WriteHeader".to_owned(),
                sig: MethodSig {
                    params: vec![Type::int()],
                    results: Vec::new(),
                },
            },
        ]
    }

    /// Declares the standard-library slice the analyzers care about into
    /// `pb` and returns the handles.
    pub fn http_env(pb: &mut ProgramBuilder) -> HttpEnv {
        pb.package("net/http", "http");
        pb.package("net/url", "url");
        pb.package("context", "context");
        pb.package("os", "os");
        pb.package("fmt", "fmt");
        pb.package("html", "html");
        pb.package("encoding/json", "json");
        pb.package("strconv", "strconv");

        let context = Type::named_interface("context", "Context", Vec::new());
        pb.register_type("context", "Context", context.clone());

        let url = Type::named("net/url", "URL", Type::Struct(Vec::new()));
        let url_values = Type::named("net/url", "Values", Type::string().slice_of());
        pb.register_type("net/url", "URL", url.clone());
        pb.register_type("net/url", "Values", url_values.clone());

        let request = Type::named("net/http", "Request", Type::Struct(Vec::new()));
        let response_writer =
            Type::named_interface("net/http", "ResponseWriter", response_writer_methods());
        let handler = Type::named_interface(
            "net/http",
            "Handler",
            vec![InterfaceMethod {
                name: "ServeHTTP".to_owned(),
                sig: MethodSig {
                    params: vec![response_writer.clone(), request.clone().pointer_to()],
                    results: Vec::new(),
                },
            }],
        );
        let handler_sig = Signature::func(
            vec![response_writer.clone(), request.clone().pointer_to()],
            Vec::new(),
        );
        let handler_func = Type::named_with_methods(
            "net/http",
            "HandlerFunc",
            Type::Signature(Box::new(handler_sig.clone())),
            vec![Method {
                name: "ServeHTTP".to_owned(),
                sig: MethodSig {
                    params: vec![response_writer.clone(), request.clone().pointer_to()],
                    results: Vec::new(),
                },
                pointer_receiver: false,
            }],
        );
        pb.register_type("net/http", "Request", request.clone());
        pb.register_type("net/http", "ResponseWriter", response_writer.clone());
        pb.register_type("net/http", "Handler", handler.clone());
        pb.register_type("net/http", "HandlerFunc", handler_func.clone());

        let request_ptr = request.clone().pointer_to();
        let body_reader = Type::any();

        let max_bytes_reader = pb.declare_func(
            "net/http",
            "MaxBytesReader",
            Signature::func(
                vec![
                    response_writer.clone(),
                    body_reader.clone(),
                    Type::Basic(crate::ssa::BasicKind::Int64),
                ],
                vec![body_reader],
            ),
        );
        let handler_func_serve_http = pb.declare_func(
            "net/http",
            "ServeHTTP",
            Signature::method(
                handler_func.clone(),
                vec![response_writer.clone(), request_ptr.clone()],
                Vec::new(),
            ),
        );
        let parse_form = pb.declare_func(
            "net/http",
            "ParseForm",
            Signature::method(request_ptr.clone(), Vec::new(), vec![Type::any()]),
        );
        let parse_multipart_form = pb.declare_func(
            "net/http",
            "ParseMultipartForm",
            Signature::method(
                request_ptr.clone(),
                vec![Type::Basic(crate::ssa::BasicKind::Int64)],
                vec![Type::any()],
            ),
        );
        let form_value = pb.declare_func(
            "net/http",
            "FormValue",
            Signature::method(request_ptr.clone(), vec![Type::string()], vec![Type::string()]),
        );
        let post_form_value = pb.declare_func(
            "net/http",
            "PostFormValue",
            Signature::method(request_ptr.clone(), vec![Type::string()], vec![Type::string()]),
        );
        let request_context = pb.declare_func(
            "net/http",
            "Context",
            Signature::method(request_ptr.clone(), Vec::new(), vec![context.clone()]),
        );
        let url_query = pb.declare_func(
            "net/url",
            "Query",
            Signature::method(url.clone().pointer_to(), Vec::new(), vec![url_values.clone()]),
        );
        let values_get = pb.declare_func(
            "net/url",
            "Get",
            Signature::method(url_values.clone(), vec![Type::string()], vec![Type::string()]),
        );
        let fprintf = pb.declare_func(
            "fmt",
            "Fprintf",
            Signature {
                recv: None,
                params: vec![Type::any(), Type::string(), Type::any()],
                results: vec![Type::int()],
                variadic: true,
            },
        );
        let http_get = pb.declare_func(
            "net/http",
            "Get",
            Signature::func(vec![Type::string()], vec![Type::any(), Type::any()]),
        );
        let http_post = pb.declare_func(
            "net/http",
            "Post",
            Signature::func(
                vec![Type::string(), Type::string(), Type::any()],
                vec![Type::any(), Type::any()],
            ),
        );
        let new_request_with_context = pb.declare_func(
            "net/http",
            "NewRequestWithContext",
            Signature::func(
                vec![context.clone(), Type::string(), Type::string(), Type::any()],
                vec![Type::any(), Type::any()],
            ),
        );
        let os_getenv = pb.declare_func(
            "os",
            "Getenv",
            Signature::func(vec![Type::string()], vec![Type::string()]),
        );
        let html_escape_string = pb.declare_func(
            "html",
            "EscapeString",
            Signature::func(vec![Type::string()], vec![Type::string()]),
        );
        let json_marshal = pb.declare_func(
            "encoding/json",
            "Marshal",
            Signature::func(vec![Type::any()], vec![Type::bytes(), Type::any()]),
        );
        let strconv_atoi = pb.declare_func(
            "strconv",
            "Atoi",
            Signature::func(vec![Type::string()], vec![Type::int(), Type::any()]),
        );
        let strconv_itoa = pb.declare_func(
            "strconv",
            "Itoa",
            Signature::func(vec![Type::int()], vec![Type::string()]),
        );

        HttpEnv {
            request,
            response_writer,
            handler,
            handler_func,
            context,
            url,
            url_values,
            max_bytes_reader,
            handler_func_serve_http,
            parse_form,
            parse_multipart_form,
            form_value,
            post_form_value,
            request_context,
            url_query,
            values_get,
            fprintf,
            http_get,
            http_post,
            new_request_with_context,
            os_getenv,
            html_escape_string,
            json_marshal,
            strconv_atoi,
            strconv_itoa,
        }
    }
}
