//! The three compilation passes over one parsed file.
//!
//! Every pass walks the file with the same [`Listener`] and differs only in
//! what it emits: [`Stage::Declare`] writes bare class shapes,
//! [`Stage::Signatures`] adds fields and member descriptors, and
//! [`Stage::Lower`] checks everything and emits code. Only the last stage
//! reports; earlier stages resolve what they can and stay silent.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kiln_classfile::{
    ClassWriter, FieldOp, FieldSpec, Instruction, InvokeKind, MethodCode, MethodSpec, Opcode, ACC_ABSTRACT,
    ACC_INTERFACE, ACC_PUBLIC, ACC_STATIC, ACC_SUPER, ACC_VARARGS,
};
use kiln_config::CompilerOptions;
use kiln_core::{Coordinate, Diagnostic};
use kiln_flow::FieldAssignment;
use kiln_syntax::ast::{
    Block, ClassDecl, ConstDecl, ConstructorDecl, Expr, ExprKind, File, Literal, MethodDecl, Param, UnaryOp,
};
use kiln_syntax::Listener;
use kiln_types::{Callable, CallableKind, MemberView, Type, TypeEnv, TypeParamDef};

use crate::codes;
use crate::error::CompileError;
use crate::expr::{field_instruction, literal_type};
use crate::fragment::Fragment;
use crate::lower::{fits_narrow, int_constant, internal, type_error, BodyKind, ClassContext, Lowerer};
use crate::optimize::constant_locals;
use crate::resolve::Scope;
use crate::variables::{Constants, FileConstant};

const ACC_BRIDGE: u16 = 0x0040;
const ACC_SYNTHETIC: u16 = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Declare,
    Signatures,
    Lower,
}

/// One class as a pass left it.
#[derive(Debug)]
pub(crate) struct ClassOutput {
    pub name: String,
    /// `None` when lowering reported errors.
    pub bytes: Option<Vec<u8>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A parameter with its resolved type.
struct ParamShape {
    name: String,
    ty: Type,
    at: Coordinate,
}

struct ClassState {
    name: String,
    is_interface: bool,
    scope: Scope,
    context: ClassContext,
    constants: Constants,
    writer: ClassWriter,
    diagnostics: Vec<Diagnostic>,
    fields: HashSet<String>,
    members: HashSet<(String, String)>,
}

pub(crate) struct FilePass<'a> {
    stage: Stage,
    env: &'a dyn TypeEnv,
    options: &'a CompilerOptions,
    file_name: &'a str,
    batch: Arc<HashSet<String>>,
    /// Classes declared again after an earlier declaration in the batch.
    skipped: &'a HashSet<Coordinate>,
    scope: Scope,
    constants: HashMap<String, FileConstant>,
    current: Option<ClassState>,
    /// File-level diagnostics: imports and constants.
    pub diagnostics: Vec<Diagnostic>,
    pub outputs: Vec<ClassOutput>,
    pub errors: Vec<CompileError>,
}

impl<'a> FilePass<'a> {
    pub fn new(
        stage: Stage,
        env: &'a dyn TypeEnv,
        options: &'a CompilerOptions,
        file_name: &'a str,
        batch: Arc<HashSet<String>>,
        skipped: &'a HashSet<Coordinate>,
    ) -> Self {
        Self {
            stage,
            env,
            options,
            file_name,
            batch,
            skipped,
            scope: Scope::default(),
            constants: HashMap::new(),
            current: None,
            diagnostics: Vec::new(),
            outputs: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn reports(&self) -> bool {
        self.stage == Stage::Lower
    }

    fn note(&mut self, diagnostics: Vec<Diagnostic>) {
        if !self.reports() {
            return;
        }
        match self.current.as_mut() {
            Some(state) => state.diagnostics.extend(diagnostics),
            None => self.diagnostics.extend(diagnostics),
        }
    }

    fn is_interface(&self, ty: &Type) -> Option<bool> {
        let def = ty.class_name().and_then(|name| self.env.class(name))?;
        Some(def.is_interface())
    }

    fn substitutions(&self, body: &Block) -> HashSet<String> {
        if self.options.propagate_constants {
            constant_locals(body)
        } else {
            HashSet::new()
        }
    }

    fn start_class(&self, class: &ClassDecl, diagnostics: &mut Vec<Diagnostic>) -> ClassState {
        let name = class.name.clone();

        // Bounds may mention any parameter of the same list.
        let shallow = class
            .type_params
            .iter()
            .map(|p| (p.name.clone(), Type::Variable(p.name.clone())))
            .collect();
        let bound_scope = self.scope.with_type_params(shallow);
        let mut type_params = Vec::with_capacity(class.type_params.len());
        for param in &class.type_params {
            let mut bounds = Vec::new();
            for bound in &param.bounds {
                let bound = bound_scope.resolve_or_null(bound, self.env, diagnostics);
                if bound != Type::Null && !bound.is_object() {
                    bounds.push(bound);
                }
            }
            type_params.push(TypeParamDef {
                name: param.name.clone(),
                bounds,
            });
        }
        let rigid = TypeParamDef::rigid(&type_params);
        let this_type = if type_params.is_empty() {
            Type::Reference(name.clone())
        } else {
            Type::Parameterised {
                raw: name.clone(),
                args: class
                    .type_params
                    .iter()
                    .filter_map(|p| rigid.get(&p.name).cloned())
                    .collect(),
            }
        };
        let scope = self.scope.with_type_params(rigid);

        let mut super_type = Type::object();
        let mut interfaces = Vec::new();
        let is_interface = class.is_interface();
        for (i, ty) in class.extends.iter().enumerate() {
            let Some(resolved) = self.supertype(&scope, class, ty, diagnostics) else {
                continue;
            };
            match (is_interface, self.is_interface(&resolved)) {
                (true, Some(false)) => diagnostics.push(type_error(
                    ty.at,
                    format!("Interface {name} cannot extend class {resolved}"),
                )),
                (true, _) => interfaces.push(resolved),
                (false, Some(true)) => diagnostics.push(type_error(
                    ty.at,
                    format!("Class {name} cannot extend interface {resolved}"),
                )),
                (false, _) if i > 0 => diagnostics.push(type_error(
                    ty.at,
                    format!("Class {name} cannot extend more than one class"),
                )),
                (false, _) => super_type = resolved,
            }
        }
        for ty in &class.implements {
            if is_interface {
                diagnostics.push(type_error(
                    ty.at,
                    format!("Interface {name} cannot implement other types; use extends"),
                ));
                continue;
            }
            let Some(resolved) = self.supertype(&scope, class, ty, diagnostics) else {
                continue;
            };
            if self.is_interface(&resolved) == Some(false) {
                diagnostics.push(type_error(
                    ty.at,
                    format!("Class {name} cannot implement class {resolved}"),
                ));
                continue;
            }
            interfaces.push(resolved);
        }

        let flags = if is_interface {
            ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT
        } else {
            ACC_PUBLIC | ACC_SUPER
        };
        let mut writer = ClassWriter::new(flags, internal(&name), Some(super_type.internal_name()));
        for interface in &interfaces {
            writer.add_interface(interface.internal_name());
        }
        if let Some(signature) = self.class_signature(&type_params, &super_type, &interfaces) {
            writer.set_signature(signature);
        }
        writer.set_source_file(self.file_name);

        let own_fields = class
            .fields()
            .filter(|f| !f.is_static)
            .map(|f| f.name.clone())
            .collect();
        ClassState {
            name: name.clone(),
            is_interface,
            scope,
            context: ClassContext {
                name,
                this_type,
                super_type,
                own_fields,
            },
            constants: Arc::new(self.constants.clone()),
            writer,
            diagnostics: Vec::new(),
            fields: HashSet::new(),
            members: HashSet::new(),
        }
    }

    fn supertype(
        &self,
        scope: &Scope,
        class: &ClassDecl,
        ty: &kiln_syntax::ast::TypeRef,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Type> {
        let resolved = scope.resolve(ty, self.env).map_err(|d| diagnostics.push(d)).ok()?;
        if resolved.class_name().is_none() || matches!(resolved, Type::Array(_)) {
            diagnostics.push(type_error(
                ty.at,
                format!("Type {resolved} cannot be a supertype of {}", class.name),
            ));
            return None;
        }
        Some(resolved)
    }

    /// The `Signature` attribute of a generic class.
    fn class_signature(&self, params: &[TypeParamDef], super_type: &Type, interfaces: &[Type]) -> Option<String> {
        let generic =
            !params.is_empty() || super_type.is_generic() || interfaces.iter().any(Type::is_generic);
        if !generic {
            return None;
        }
        let mut out = String::new();
        if !params.is_empty() {
            out.push('<');
            for param in params {
                out.push_str(&param.name);
                if param.bounds.is_empty() {
                    out.push_str(":Ljava/lang/Object;");
                }
                for (i, bound) in param.bounds.iter().enumerate() {
                    // An interface first bound leaves the class bound empty.
                    if i == 0 && self.is_interface(bound) == Some(true) {
                        out.push(':');
                    }
                    out.push(':');
                    out.push_str(&bound.signature());
                }
            }
            out.push('>');
        }
        out.push_str(&super_type.signature());
        for interface in interfaces {
            out.push_str(&interface.signature());
        }
        Some(out)
    }

    fn params(&self, scope: &Scope, params: &[Param], diagnostics: &mut Vec<Diagnostic>) -> Vec<ParamShape> {
        let last = params.len().saturating_sub(1);
        params
            .iter()
            .enumerate()
            .map(|(i, param)| {
                let mut ty = scope.resolve_or_null(&param.ty, self.env, diagnostics);
                if ty.is_void() {
                    diagnostics.push(type_error(
                        param.at,
                        format!("Parameter '{}' cannot have type Void", param.name),
                    ));
                    ty = Type::Null;
                }
                if param.variadic {
                    if i != last {
                        diagnostics.push(type_error(
                            param.at,
                            "Only the last parameter may be variadic",
                        ));
                    }
                    ty = Type::array_of(ty);
                }
                ParamShape {
                    name: param.name.clone(),
                    ty,
                    at: param.at,
                }
            })
            .collect()
    }

    fn callable(
        state: &ClassState,
        name: &str,
        kind: CallableKind,
        params: &[ParamShape],
        return_type: Type,
        is_static: bool,
        is_varargs: bool,
    ) -> Callable {
        let is_abstract = state.is_interface && kind == CallableKind::Method;
        let mut access_flags = ACC_PUBLIC;
        if is_static {
            access_flags |= ACC_STATIC;
        }
        if is_varargs {
            access_flags |= ACC_VARARGS;
        }
        if is_abstract {
            access_flags |= ACC_ABSTRACT;
        }
        let generic_params: Vec<Type> = params.iter().map(|p| p.ty.clone()).collect();
        Callable {
            owner: state.name.clone(),
            name: name.to_string(),
            kind,
            params: generic_params.iter().map(Type::erasure).collect(),
            generic_params,
            return_type: return_type.erasure(),
            generic_return: return_type,
            type_params: Vec::new(),
            is_varargs,
            is_static,
            is_abstract,
            is_interface_owner: state.is_interface,
            access_flags,
        }
    }

    fn declare_params(lowerer: &mut Lowerer<'_>, params: &[ParamShape]) -> Fragment {
        params
            .iter()
            .filter_map(|p| lowerer.vars.declare(&p.name, p.ty.clone(), p.at).err())
            .map(Fragment::from_error)
            .collect()
    }

    fn finish_body(lowerer: Lowerer<'_>, fragment: Fragment) -> (MethodCode, Vec<Diagnostic>) {
        let max_locals = lowerer.max_locals();
        let (mut diagnostics, instructions) = fragment.into_parts();
        diagnostics.extend(lowerer.finish());
        (
            MethodCode {
                instructions,
                max_locals,
            },
            diagnostics,
        )
    }

    fn lower_method(
        &self,
        state: &ClassState,
        method: &MethodDecl,
        params: &[ParamShape],
        return_type: &Type,
        body: &Block,
    ) -> (MethodCode, Vec<Diagnostic>) {
        let mut lowerer = Lowerer::new(
            self.env,
            &state.scope,
            &state.context,
            method.is_static,
            BodyKind::Method,
            Arc::clone(&state.constants),
        )
        .returning(return_type.clone())
        .substituting(self.substitutions(body));

        let mut fragment = Self::declare_params(&mut lowerer, params);
        let (code, completes) = lowerer.lower_block(body);
        fragment = fragment.concat(code);
        if completes {
            fragment = if return_type.is_void() {
                fragment.add(Instruction::Op(Opcode::Return))
            } else {
                fragment.add_error(kiln_flow::missing_return(method.at))
            };
        }
        Self::finish_body(lowerer, fragment)
    }

    /// Field initialisers of one kind, each stored into its field.
    fn field_initializers(&self, state: &ClassState, lowerer: &mut Lowerer<'_>, class: &ClassDecl, statics: bool) -> Fragment {
        let previous = lowerer.kind;
        lowerer.kind = BodyKind::Initializer;
        let mut seen = HashSet::new();
        let mut fragment = Fragment::empty();
        for field in class.fields().filter(|f| f.is_static == statics) {
            if !seen.insert(field.name.as_str()) {
                continue;
            }
            let Some(init) = &field.init else {
                continue;
            };
            let this_type = &state.context.this_type;
            let Some(def) = this_type
                .field_named(&field.name, self.env)
                .filter(|def| def.owner == state.name)
            else {
                continue;
            };
            let field_ty = def.type_through(this_type, self.env);
            let from = lowerer.type_of(init);
            if !statics {
                fragment = fragment.add(lowerer.this_load());
            }
            fragment = fragment.concat(lowerer.lower_coerced(init, &field_ty));
            if !lowerer.assignable(init, &from, &field_ty) {
                fragment = fragment.add_error(type_error(
                    field.at,
                    format!("Cannot assign expression of type {from} to field of type {field_ty}"),
                ));
            }
            let op = if statics { FieldOp::PutStatic } else { FieldOp::PutField };
            fragment = fragment.add(field_instruction(&def, op));
        }
        lowerer.kind = previous;
        fragment
    }

    fn lower_constructor(
        &self,
        state: &ClassState,
        class: &ClassDecl,
        params: &[ParamShape],
        body: Option<&Block>,
        at: Coordinate,
    ) -> (MethodCode, Vec<Diagnostic>) {
        let substitutions = body.map(|b| self.substitutions(b)).unwrap_or_default();
        let mut lowerer = Lowerer::new(
            self.env,
            &state.scope,
            &state.context,
            false,
            BodyKind::Constructor,
            Arc::clone(&state.constants),
        )
        .substituting(substitutions);
        lowerer.assigned = FieldAssignment::of(
            class
                .fields()
                .filter(|f| !f.is_static && f.init.is_some())
                .map(|f| f.name.clone()),
        );

        let mut fragment = Self::declare_params(&mut lowerer, params);
        let statements = body.map_or(&[][..], |b| b.statements.as_slice());
        let leading = statements
            .first()
            .and_then(|stmt| Lowerer::constructor_call_of(stmt).map(|call| (stmt.at, call)));
        let (rest, delegates) = match leading {
            Some((call_at, (delegates, args))) => {
                fragment = fragment.concat(lowerer.lower_constructor_call(delegates, args, call_at));
                (&statements[1..], delegates)
            }
            None => {
                fragment = fragment.concat(lowerer.lower_constructor_call(false, &[], at));
                (statements, false)
            }
        };
        if delegates {
            lowerer.assigned = FieldAssignment::Total;
        } else {
            fragment = fragment.concat(self.field_initializers(state, &mut lowerer, class, false));
        }

        let (code, completes) = lowerer.lower_statements(rest);
        fragment = fragment.concat(code);
        if completes {
            fragment = fragment.add(Instruction::Op(Opcode::Return));
        }
        Self::finish_body(lowerer, fragment)
    }

    fn emit_constructor(&mut self, class: &ClassDecl, ctor: Option<&ConstructorDecl>) {
        let Some(state) = self.current.as_ref() else {
            return;
        };
        let mut diagnostics = Vec::new();
        if let Some(ctor) = ctor {
            if state.is_interface {
                diagnostics.push(type_error(
                    ctor.at,
                    format!("Interface {} cannot declare constructors", state.name),
                ));
                self.note(diagnostics);
                return;
            }
            if ctor.name != class.name {
                diagnostics.push(type_error(
                    ctor.at,
                    format!("Method '{}' needs a return type", ctor.name),
                ));
            }
        }
        let (param_decls, at) = match ctor {
            Some(ctor) => (ctor.params.as_slice(), ctor.at),
            None => (&[][..], class.at),
        };
        let params = self.params(&state.scope, param_decls, &mut diagnostics);
        let is_varargs = param_decls.last().is_some_and(|p| p.variadic);
        let callable = Self::callable(state, "<init>", CallableKind::Constructor, &params, Type::void(), false, is_varargs);
        let descriptor = callable.descriptor();
        if state.members.contains(&("<init>".to_string(), descriptor.clone())) {
            diagnostics.push(Diagnostic::error(
                codes::DUPLICATE,
                at,
                format!("Duplicate constructor {}", callable.display()),
            ));
            self.note(diagnostics);
            return;
        }

        let code = if self.stage == Stage::Lower {
            let (code, lowered) = self.lower_constructor(state, class, &params, ctor.map(|c| &c.body), at);
            diagnostics.extend(lowered);
            Some(code)
        } else {
            None
        };
        self.note(diagnostics);
        if let Some(state) = self.current.as_mut() {
            state.members.insert(("<init>".to_string(), descriptor.clone()));
            state.writer.add_method(MethodSpec {
                access_flags: callable.access_flags,
                name: "<init>".to_string(),
                descriptor,
                signature: callable.signature(),
                code,
            });
        }
    }

    fn emit_static_initializer(&mut self, class: &ClassDecl) {
        if !class.fields().any(|f| f.is_static && f.init.is_some()) {
            return;
        }
        let Some(state) = self.current.as_ref() else {
            return;
        };
        let mut lowerer = Lowerer::new(
            self.env,
            &state.scope,
            &state.context,
            true,
            BodyKind::Initializer,
            Arc::clone(&state.constants),
        );
        let fragment = self
            .field_initializers(state, &mut lowerer, class, true)
            .add(Instruction::Op(Opcode::Return));
        let (code, diagnostics) = Self::finish_body(lowerer, fragment);
        self.note(diagnostics);
        if let Some(state) = self.current.as_mut() {
            state.writer.add_method(MethodSpec {
                access_flags: ACC_STATIC,
                name: "<clinit>".to_string(),
                descriptor: "()V".to_string(),
                signature: None,
                code: Some(code),
            });
        }
    }

    /// Abstract methods a concrete class inherits must be implemented; an
    /// implementation whose erasure differs gets a bridge.
    fn check_implementations(&mut self, class: &ClassDecl) {
        let Some(state) = self.current.as_ref() else {
            return;
        };
        if state.is_interface {
            return;
        }
        let this_type = &state.context.this_type;
        let methods = this_type.methods(self.env, MemberView::Public);
        let mut diagnostics = Vec::new();
        let mut bridges = Vec::new();
        let mut bridged = HashSet::new();
        for required in methods.iter().filter(|m| m.is_abstract) {
            let bound = required.with_owner(this_type, self.env);
            let erased: Vec<Type> = bound.generic_params.iter().map(Type::erasure).collect();
            let implementation = methods.iter().find(|m| {
                !m.is_abstract
                    && !m.is_static
                    && m.name == required.name
                    && (m.params == required.params || m.params == erased)
            });
            let Some(implementation) = implementation else {
                diagnostics.push(Diagnostic::error(
                    codes::UNIMPLEMENTED_METHOD,
                    class.at,
                    format!(
                        "Class {} does not implement method {} of interface {}",
                        state.name,
                        bound.display(),
                        required.owner
                    ),
                ));
                continue;
            };
            if !implementation.generic_return.is_assignable_to(&bound.generic_return, self.env) {
                diagnostics.push(type_error(
                    class.at,
                    format!(
                        "Method {} of class {} cannot implement {} of interface {}: {} is not assignable to {}",
                        implementation.display(),
                        implementation.owner,
                        bound.display(),
                        required.owner,
                        implementation.generic_return,
                        bound.generic_return
                    ),
                ));
                continue;
            }
            let descriptor = required.descriptor();
            if implementation.descriptor() != descriptor
                && implementation.owner == state.name
                && bridged.insert(descriptor)
            {
                bridges.push(self.bridge(state, required, implementation));
            }
        }
        self.note(diagnostics);
        if let Some(state) = self.current.as_mut() {
            for bridge in bridges {
                state.writer.add_method(bridge);
            }
        }
    }

    /// `required`'s descriptor forwarding to `target` with casts.
    fn bridge(&self, state: &ClassState, required: &Callable, target: &Callable) -> MethodSpec {
        let mut instructions = vec![Instruction::Load(kiln_classfile::LocalKind::Reference, 0)];
        let mut slot: u16 = 1;
        for (from, to) in required.params.iter().zip(&target.params) {
            instructions.push(Instruction::Load(from.local_kind(), slot));
            slot += from.width();
            if from != to {
                instructions.extend(from.cast_to(to, self.env).unwrap_or_default());
            }
        }
        instructions.push(Instruction::Invoke {
            kind: InvokeKind::Virtual,
            owner: internal(&state.name),
            name: target.name.clone(),
            descriptor: target.descriptor(),
            interface: false,
        });
        instructions.extend(target.return_type.coerce_to(&required.return_type, self.env));
        instructions.push(Instruction::Op(if required.return_type.is_void() {
            Opcode::Return
        } else {
            required.return_type.local_kind().return_op()
        }));
        MethodSpec {
            access_flags: ACC_PUBLIC | ACC_BRIDGE | ACC_SYNTHETIC,
            name: required.name.clone(),
            descriptor: required.descriptor(),
            signature: None,
            code: Some(MethodCode {
                instructions,
                max_locals: slot,
            }),
        }
    }
}

/// The type of a literal constant initialiser, negated literals included.
fn constant_type(value: &Expr) -> Option<Type> {
    match &value.kind {
        ExprKind::Literal(literal) => Some(literal_type(literal)),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match &operand.kind {
            ExprKind::Literal(
                literal @ (Literal::Int(_) | Literal::Long(_) | Literal::Float(_) | Literal::Num(_)),
            ) => Some(literal_type(literal)),
            _ => None,
        },
        _ => None,
    }
}

impl Listener for FilePass<'_> {
    fn enter_file(&mut self, file: &File) {
        self.scope = Scope::new(&file.imports, Arc::clone(&self.batch));
        let unknown: Vec<Diagnostic> = file
            .imports
            .iter()
            .filter(|import| !import.is_star && self.scope.class_name(&import.path, self.env).is_none())
            .map(|import| {
                Diagnostic::error(
                    codes::UNKNOWN_TYPE,
                    import.at,
                    format!("Unknown type '{}'", import.path),
                )
            })
            .collect();
        self.note(unknown);
    }

    fn enter_const(&mut self, decl: &ConstDecl) {
        let mut diagnostics = Vec::new();
        let ty = self.scope.resolve_or_null(&decl.ty, self.env, &mut diagnostics);
        let mut constant = FileConstant {
            ty: ty.clone(),
            value: decl.value.clone(),
        };
        match constant_type(&decl.value) {
            None => {
                diagnostics.push(type_error(
                    decl.at,
                    format!("Constant '{}' must be initialised with a literal", decl.name),
                ));
                constant = FileConstant {
                    ty: Type::Null,
                    value: Expr::new(ExprKind::Literal(Literal::Null), decl.at),
                };
            }
            Some(value_ty) => {
                let narrows = int_constant(&decl.value).is_some_and(|v| fits_narrow(v, &ty));
                if ty != Type::Null && !value_ty.is_assignable_to(&ty, self.env) && !narrows {
                    diagnostics.push(type_error(
                        decl.at,
                        format!("Cannot assign expression of type {value_ty} to constant of type {ty}"),
                    ));
                }
            }
        }
        if self.constants.contains_key(&decl.name) {
            diagnostics.push(Diagnostic::error(
                codes::DUPLICATE,
                decl.at,
                format!("Duplicate constant '{}'", decl.name),
            ));
        } else {
            self.constants.insert(decl.name.clone(), constant);
        }
        self.note(diagnostics);
    }

    fn enter_class(&mut self, class: &ClassDecl) {
        if self.skipped.contains(&class.at) {
            self.current = None;
            return;
        }
        let mut diagnostics = Vec::new();
        let state = self.start_class(class, &mut diagnostics);
        tracing::debug!(target: "kiln.codegen", class = %state.name, stage = ?self.stage, "entering class");
        self.current = Some(state);
        self.note(diagnostics);
    }

    fn enter_field(&mut self, _class: &ClassDecl, field: &kiln_syntax::ast::FieldDecl) {
        if self.stage == Stage::Declare {
            return;
        }
        let Some(state) = self.current.as_ref() else {
            return;
        };
        let mut diagnostics = Vec::new();
        if state.is_interface {
            diagnostics.push(type_error(
                field.at,
                format!("Interface {} cannot declare fields", state.name),
            ));
            self.note(diagnostics);
            return;
        }
        let mut ty = state.scope.resolve_or_null(&field.ty, self.env, &mut diagnostics);
        if ty.is_void() {
            diagnostics.push(type_error(
                field.at,
                format!("Field '{}' cannot have type Void", field.name),
            ));
            ty = Type::Null;
        }
        if state.fields.contains(&field.name) {
            diagnostics.push(Diagnostic::error(
                codes::DUPLICATE,
                field.at,
                format!("Duplicate field '{}'", field.name),
            ));
            self.note(diagnostics);
            return;
        }
        self.note(diagnostics);

        let mut access_flags = ACC_PUBLIC;
        if field.is_static {
            access_flags |= ACC_STATIC;
        }
        if let Some(state) = self.current.as_mut() {
            state.fields.insert(field.name.clone());
            state.writer.add_field(FieldSpec {
                access_flags,
                name: field.name.clone(),
                descriptor: ty.descriptor(),
                signature: ty.is_generic().then(|| ty.signature()),
            });
        }
    }

    fn exit_method(&mut self, _class: &ClassDecl, method: &MethodDecl) {
        if self.stage == Stage::Declare {
            return;
        }
        let Some(state) = self.current.as_ref() else {
            return;
        };
        let mut diagnostics = Vec::new();
        let params = self.params(&state.scope, &method.params, &mut diagnostics);
        let return_type = state.scope.resolve_or_null(&method.return_ty, self.env, &mut diagnostics);
        let is_varargs = method.params.last().is_some_and(|p| p.variadic);
        let callable = Self::callable(
            state,
            &method.name,
            CallableKind::Method,
            &params,
            return_type.clone(),
            method.is_static,
            is_varargs,
        );

        if state.is_interface {
            if method.body.is_some() {
                diagnostics.push(type_error(
                    method.at,
                    format!("Interface method '{}' cannot have a body", method.name),
                ));
            }
            if method.is_static {
                diagnostics.push(type_error(
                    method.at,
                    format!("Interface method '{}' cannot be static", method.name),
                ));
            }
        } else if method.body.is_none() {
            diagnostics.push(type_error(
                method.at,
                format!("Method '{}' must have a body", method.name),
            ));
        }

        let descriptor = callable.descriptor();
        let key = (method.name.clone(), descriptor.clone());
        if state.members.contains(&key) {
            diagnostics.push(Diagnostic::error(
                codes::DUPLICATE,
                method.at,
                format!("Duplicate method {}", callable.display()),
            ));
            self.note(diagnostics);
            return;
        }

        let code = match (&method.body, self.stage) {
            (Some(body), Stage::Lower) if !state.is_interface => {
                let (code, lowered) = self.lower_method(state, method, &params, &return_type, body);
                diagnostics.extend(lowered);
                Some(code)
            }
            _ => None,
        };
        self.note(diagnostics);
        if let Some(state) = self.current.as_mut() {
            state.members.insert(key);
            state.writer.add_method(MethodSpec {
                access_flags: callable.access_flags,
                name: method.name.clone(),
                descriptor,
                signature: callable.signature(),
                code,
            });
        }
    }

    fn exit_constructor(&mut self, class: &ClassDecl, ctor: &ConstructorDecl) {
        if self.stage != Stage::Declare {
            self.emit_constructor(class, Some(ctor));
        }
    }

    fn exit_class(&mut self, class: &ClassDecl) {
        if self.current.is_none() {
            return;
        }
        if self.stage != Stage::Declare && !class.is_interface() && class.constructors().next().is_none() {
            self.emit_constructor(class, None);
        }
        if self.stage == Stage::Lower {
            self.emit_static_initializer(class);
            self.check_implementations(class);
        }

        let Some(state) = self.current.take() else {
            return;
        };
        let failed = self.reports() && state.diagnostics.iter().any(Diagnostic::is_error);
        let bytes = if failed {
            None
        } else {
            match state.writer.finish() {
                Ok(bytes) => Some(bytes),
                Err(source) => {
                    self.errors.push(CompileError::ClassFile {
                        class: state.name.clone(),
                        source,
                    });
                    None
                }
            }
        };
        tracing::debug!(
            target: "kiln.codegen",
            class = %state.name,
            stage = ?self.stage,
            diagnostics = state.diagnostics.len(),
            emitted = bytes.is_some(),
            "finished class"
        );
        self.outputs.push(ClassOutput {
            name: state.name,
            bytes,
            diagnostics: state.diagnostics,
        });
    }
}
