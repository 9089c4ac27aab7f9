//! Statement lowering and definite-assignment tracking.

use kiln_classfile::{FieldOp, Instruction, InvokeKind, JumpOp, Opcode};
use kiln_core::Coordinate;
use kiln_flow::FieldAssignment;
use kiln_syntax::ast::{AssignOp, BinaryOp, Block, Expr, ExprKind, Literal, Stmt, StmtKind, TypeRef};
use kiln_types::{FieldDef, PrimitiveType, Type};

use crate::expr::{field_instruction, unknown_field};
use crate::fragment::Fragment;
use crate::lower::Lowerer;
use crate::ops;
use crate::variables::Variable;

/// A lowered statement and whether control can fall out of it.
pub(crate) type Lowered = (Fragment, bool);

fn is_true(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(Literal::Bool(true)))
}

fn string_call(kind: InvokeKind, name: &str, descriptor: String) -> Instruction {
    Instruction::Invoke {
        kind,
        owner: "java/lang/String".to_string(),
        name: name.to_string(),
        descriptor,
        interface: false,
    }
}

impl Lowerer<'_> {
    /// A statement sequence. Only the first unreachable statement is
    /// reported; the rest are not lowered.
    pub fn lower_statements(&mut self, statements: &[Stmt]) -> Lowered {
        let mut fragment = Fragment::empty();
        let mut completes = true;
        for stmt in statements {
            if !completes {
                fragment = fragment.add_error(kiln_flow::unreachable_statement(stmt.at));
                break;
            }
            let (code, next) = self.lower_stmt(stmt);
            fragment = fragment.concat(code);
            completes = next;
        }
        (fragment, completes)
    }

    pub fn lower_block(&mut self, block: &Block) -> Lowered {
        self.scoped(|this| this.lower_statements(&block.statements))
    }

    /// Run `lower` inside a fresh block scope.
    fn scoped<T>(&mut self, lower: impl FnOnce(&mut Self) -> T) -> T {
        self.vars.push_scope();
        let lowered = lower(self);
        self.vars.pop_scope();
        lowered
    }

    pub fn lower_stmt(&mut self, stmt: &Stmt) -> Lowered {
        let at = stmt.at;
        match &stmt.kind {
            StmtKind::Block(block) => self.lower_block(block),
            StmtKind::Local { ty, name, init } => (self.lower_local(ty.as_ref(), name, init.as_ref(), at), true),
            StmtKind::Assign { target, op, value } => (self.lower_assign(target, *op, value, at), true),
            StmtKind::Step { target, increment } => (self.lower_step(target, *increment, at), true),
            StmtKind::Expr(expr) => (self.lower_expr_stmt(expr), true),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_deref()),
            StmtKind::While { cond, body } => self.lower_loop(Some(cond), None, body),
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.scoped(|this| {
                let init = match init {
                    Some(init) => this.lower_stmt(init).0,
                    None => Fragment::empty(),
                };
                let (code, completes) = this.lower_loop(cond.as_ref(), step.as_deref(), body);
                (init.concat(code), completes)
            }),
            StmtKind::Return(value) => (self.lower_return(value.as_ref(), at), false),
        }
    }

    fn lower_expr_stmt(&mut self, expr: &Expr) -> Fragment {
        let ty = self.type_of(expr);
        let fragment = self.lower_expr(expr);
        if fragment.has_errors() {
            return fragment;
        }
        fragment.add_all(ops::pop(ty.width()))
    }

    fn lower_local(&mut self, ty: Option<&TypeRef>, name: &str, init: Option<&Expr>, at: Coordinate) -> Fragment {
        let mut fragment = Fragment::empty();
        let declared = ty.map(|ty| match self.scope.resolve(ty, self.env) {
            Ok(resolved) if resolved.is_void() => {
                fragment = std::mem::take(&mut fragment).add_error(crate::lower::type_error(
                    at,
                    format!("Variable '{name}' cannot have type Void"),
                ));
                Type::Null
            }
            Ok(resolved) => resolved,
            Err(diagnostic) => {
                fragment = std::mem::take(&mut fragment).add_error(diagnostic);
                Type::Null
            }
        });

        let (value, value_ty) = match init {
            Some(Expr {
                kind: ExprKind::Attempt(inner),
                at: attempt_at,
            }) => (
                self.lower_attempt(inner, *attempt_at),
                Type::Attempted(Box::new(self.type_of(inner))),
            ),
            Some(init) => (self.lower_expr(init), self.type_of(init)),
            None => (Fragment::empty(), Type::Null),
        };
        fragment = fragment.concat(value);

        let var_ty = match (declared, init) {
            (Some(declared), _) => declared,
            (None, Some(init)) => match self.infer(name, init, &value_ty, at) {
                Ok(inferred) => inferred,
                Err(diagnostic) => {
                    fragment = fragment.add_error(diagnostic);
                    Type::Null
                }
            },
            (None, None) => {
                fragment = fragment.add_error(crate::lower::type_error(
                    at,
                    format!("Cannot infer the type of '{name}' without an initialiser"),
                ));
                Type::Null
            }
        };

        let variable = match self.vars.declare(name, var_ty.clone(), at) {
            Ok(variable) => variable,
            Err(diagnostic) => return fragment.add_error(diagnostic),
        };

        match init {
            None => fragment
                .add(ops::zero(&var_ty))
                .add(Instruction::Store(var_ty.local_kind(), variable.slot)),
            Some(init) => {
                if var_ty != Type::Null && !self.assignable(init, &value_ty, &var_ty) {
                    fragment = fragment.add_error(crate::lower::type_error(
                        at,
                        format!("Cannot assign expression of type {value_ty} to variable of type {var_ty}"),
                    ));
                }
                if matches!(init.kind, ExprKind::Literal(_)) && self.is_substitutable(name) {
                    self.vars.substitute(name, init.clone());
                }
                fragment
                    .add_all(value_ty.coerce_to(&var_ty, self.env))
                    .add(Instruction::Store(var_ty.local_kind(), variable.slot))
            }
        }
    }

    /// The type of a `var` local.
    fn infer(&self, name: &str, init: &Expr, value_ty: &Type, at: Coordinate) -> Result<Type, kiln_core::Diagnostic> {
        if matches!(init.kind, ExprKind::Literal(Literal::Null)) {
            return Err(crate::lower::type_error(
                at,
                format!("Cannot infer the type of '{name}' from null"),
            ));
        }
        if value_ty.is_void() {
            return Err(crate::lower::type_error(
                at,
                format!("Cannot infer the type of '{name}' from Void"),
            ));
        }
        Ok(match value_ty {
            Type::Generic { .. } => match value_ty.actual() {
                Type::Variable(_) => value_ty.actual().erasure(),
                actual => actual.clone(),
            },
            other => other.clone(),
        })
    }

    fn lower_assign(&mut self, target: &Expr, op: AssignOp, value: &Expr, at: Coordinate) -> Fragment {
        match &target.kind {
            ExprKind::Name(name) => self.assign_name(name, op, value, at),
            ExprKind::Field { target: receiver, name } => self.assign_field(receiver, name, op, value, at),
            ExprKind::Index { target: array, index } => self.assign_index(array, index, op, value, at),
            _ => self
                .lower_expr(value)
                .add_error(crate::lower::type_error(at, "Cannot assign to this expression")),
        }
    }

    fn assign_name(&mut self, name: &str, op: AssignOp, value: &Expr, at: Coordinate) -> Fragment {
        if let Some(variable) = self.vars.lookup(name).cloned() {
            return self.assign_local(&variable, op, value, at);
        }
        if self.vars.constant(name).is_some() {
            return self
                .lower_expr(value)
                .add_error(crate::lower::type_error(at, format!("Cannot assign to constant '{name}'")));
        }
        if let Some(field) = self.implicit_field(name) {
            if field.is_static() {
                return self.assign_static(&field, op, value, at);
            }
            if self.is_static {
                return self.lower_expr(value).add_error(crate::lower::type_error(
                    at,
                    format!("Cannot access instance field '{name}' from a static context"),
                ));
            }
            let receiver = Fragment::empty().add(self.this_load());
            let this_type = self.class.this_type.clone();
            return self.assign_instance(receiver, &this_type, &field, true, op, value, at);
        }
        self.vars.write(name, at);
        self.lower_expr(value)
    }

    fn assign_local(&mut self, variable: &Variable, op: AssignOp, value: &Expr, at: Coordinate) -> Fragment {
        let store = Instruction::Store(variable.ty.local_kind(), variable.slot);
        match op.binary() {
            None => {
                let (code, from) = match &value.kind {
                    ExprKind::Attempt(inner) => (
                        self.lower_attempt(inner, value.at),
                        Type::Attempted(Box::new(self.type_of(inner))),
                    ),
                    _ => (self.lower_expr(value), self.type_of(value)),
                };
                let mut fragment = code;
                if !self.assignable(value, &from, &variable.ty) {
                    fragment = fragment.add_error(crate::lower::type_error(
                        at,
                        format!(
                            "Cannot assign expression of type {from} to variable of type {}",
                            variable.ty
                        ),
                    ));
                }
                fragment.add_all(from.coerce_to(&variable.ty, self.env)).add(store)
            }
            Some(binary) => Fragment::empty()
                .add(Instruction::Load(variable.ty.local_kind(), variable.slot))
                .concat(self.compound(&variable.ty, binary, value, at))
                .add(store),
        }
    }

    fn assign_field(&mut self, receiver: &Expr, name: &str, op: AssignOp, value: &Expr, at: Coordinate) -> Fragment {
        if let Some(class) = self.as_type_name(receiver) {
            return match class.field_named(name, self.env) {
                Some(field) if field.is_static() => self.assign_static(&field, op, value, at),
                Some(_) => self.lower_expr(value).add_error(crate::lower::type_error(
                    at,
                    format!("Cannot access instance field '{name}' of {class} without an instance"),
                )),
                None => self.lower_expr(value).add_error(unknown_field(name, &class, at)),
            };
        }
        let (code, receiver_ty) = self.lower_value(receiver);
        if self.is_unresolved(receiver) {
            return code.concat(self.lower_expr(value));
        }
        match receiver_ty.field_named(name, self.env) {
            None => code
                .concat(self.lower_expr(value))
                .add_error(unknown_field(name, &receiver_ty, at)),
            Some(field) if field.is_static() => code
                .add_all(ops::pop(1))
                .concat(self.assign_static(&field, op, value, at)),
            Some(field) => {
                let through_this = receiver.kind == ExprKind::This;
                self.assign_instance(code, &receiver_ty, &field, through_this, op, value, at)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assign_instance(
        &mut self,
        receiver: Fragment,
        receiver_ty: &Type,
        field: &FieldDef,
        through_this: bool,
        op: AssignOp,
        value: &Expr,
        at: Coordinate,
    ) -> Fragment {
        let field_ty = field.type_through(receiver_ty, self.env);
        let put = field_instruction(field, FieldOp::PutField);
        match op.binary() {
            None => {
                let from = self.type_of(value);
                let mut fragment = receiver.concat(self.lower_expr(value));
                if !self.assignable(value, &from, &field_ty) {
                    fragment = fragment.add_error(crate::lower::type_error(
                        at,
                        format!("Cannot assign expression of type {from} to field of type {field_ty}"),
                    ));
                }
                if through_this {
                    self.assigned = std::mem::take(&mut self.assigned).assign(&field.name);
                }
                fragment.add_all(from.coerce_to(&field_ty, self.env)).add(put)
            }
            Some(binary) => {
                let mut fragment = receiver;
                if through_this {
                    if let Some(diagnostic) = self.check_field_read(field, at) {
                        fragment = fragment.add_error(diagnostic);
                    }
                }
                fragment
                    .add(Instruction::Op(Opcode::Dup))
                    .add(field_instruction(field, FieldOp::GetField))
                    .concat(self.compound(&field_ty, binary, value, at))
                    .add(put)
            }
        }
    }

    fn assign_static(&mut self, field: &FieldDef, op: AssignOp, value: &Expr, at: Coordinate) -> Fragment {
        let field_ty = field.type_through(&Type::reference(field.owner.clone()), self.env);
        let put = field_instruction(field, FieldOp::PutStatic);
        match op.binary() {
            None => {
                let from = self.type_of(value);
                let mut fragment = self.lower_expr(value);
                if !self.assignable(value, &from, &field_ty) {
                    fragment = fragment.add_error(crate::lower::type_error(
                        at,
                        format!("Cannot assign expression of type {from} to field of type {field_ty}"),
                    ));
                }
                fragment.add_all(from.coerce_to(&field_ty, self.env)).add(put)
            }
            Some(binary) => Fragment::empty()
                .add(field_instruction(field, FieldOp::GetStatic))
                .concat(self.compound(&field_ty, binary, value, at))
                .add(put),
        }
    }

    fn assign_index(&mut self, array: &Expr, index: &Expr, op: AssignOp, value: &Expr, at: Coordinate) -> Fragment {
        let (code, element) = self.lower_indexed(array, index);
        let Some(element) = element else {
            return code.concat(self.lower_expr(value));
        };
        let store = Instruction::Op(ops::array_store(&element));
        match op.binary() {
            None => {
                let from = self.type_of(value);
                let mut fragment = code.concat(self.lower_expr(value));
                if !self.assignable(value, &from, &element) {
                    fragment = fragment.add_error(crate::lower::type_error(
                        at,
                        format!("Cannot assign expression of type {from} to array element of type {element}"),
                    ));
                }
                fragment.add_all(from.coerce_to(&element, self.env)).add(store)
            }
            Some(binary) => code
                .add(Instruction::Op(Opcode::Dup2))
                .add(Instruction::Op(ops::array_load(&element)))
                .concat(self.compound(&element, binary, value, at))
                .add(store),
        }
    }

    /// Combine the current value of type `current`, already on the stack,
    /// with `value`; leaves a `current` on the stack.
    fn compound(&mut self, current: &Type, op: BinaryOp, value: &Expr, at: Coordinate) -> Fragment {
        let value_ty = self.type_of(value);
        if op == BinaryOp::Add && current.is_string() {
            if value_ty.is_void() {
                return self
                    .lower_expr(value)
                    .add_error(crate::lower::type_error(at, "Cannot concatenate a Void value"));
            }
            let descriptor = match ops::string_conversion_descriptor(&value_ty) {
                "Ljava/lang/String;" => "Ljava/lang/Object;",
                other => other,
            };
            let value_code = self.lower_expr(value);
            let boxed = if value_ty.is_primitive() {
                Vec::new()
            } else {
                value_ty.coerce_to(&Type::object(), self.env)
            };
            return Fragment::empty()
                .add(string_call(
                    InvokeKind::Static,
                    "valueOf",
                    "(Ljava/lang/Object;)Ljava/lang/String;".to_string(),
                ))
                .concat(value_code)
                .add_all(boxed)
                .add(string_call(
                    InvokeKind::Static,
                    "valueOf",
                    format!("({descriptor})Ljava/lang/String;"),
                ))
                .add(string_call(
                    InvokeKind::Virtual,
                    "concat",
                    "(Ljava/lang/String;)Ljava/lang/String;".to_string(),
                ));
        }

        let promoted = ops::unboxed(current)
            .zip(ops::unboxed(&value_ty))
            .and_then(|(a, b)| ops::promote(a, b));
        let Some(p) = promoted else {
            let fragment = self.lower_expr(value);
            if self.is_unresolved(value) {
                return fragment;
            }
            return fragment.add_error(crate::lower::type_error(
                at,
                format!("Operator '{}=' cannot be applied to {current} and {value_ty}", op.symbol()),
            ));
        };
        let widened = Type::Primitive(p);
        let Some(narrowed) = widened.cast_to(current, self.env) else {
            return self.lower_expr(value).add_error(crate::lower::type_error(
                at,
                format!("Operator '{}=' cannot be applied to {current} and {value_ty}", op.symbol()),
            ));
        };
        Fragment::empty()
            .add_all(self.numeric_coercion(current, p))
            .concat(self.lower_expr(value))
            .add_all(self.numeric_coercion(&value_ty, p))
            .add_all(ops::arithmetic(op, p.local_kind()).map(Instruction::Op))
            .add_all(narrowed)
    }

    fn lower_step(&mut self, target: &Expr, increment: bool, at: Coordinate) -> Fragment {
        let symbol = if increment { "++" } else { "--" };
        if let ExprKind::Name(name) = &target.kind {
            if let Some(variable) = self.vars.lookup(name) {
                if variable.ty == Type::int() {
                    return Fragment::empty().add(Instruction::Iinc {
                        slot: variable.slot,
                        delta: if increment { 1 } else { -1 },
                    });
                }
            }
        }
        let ty = self.type_of(target);
        let numeric = ops::unboxed(&ty).is_some_and(|p| p != PrimitiveType::Bool);
        if !numeric && !self.is_unresolved(target) {
            return Fragment::from_error(crate::lower::type_error(
                at,
                format!("Operator '{symbol}' cannot be applied to {ty}"),
            ));
        }
        let one = Expr::new(ExprKind::Literal(Literal::Int(1)), at);
        let op = if increment { AssignOp::Add } else { AssignOp::Sub };
        self.lower_assign(target, op, &one, at)
    }

    fn lower_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> Lowered {
        let pre = self.assigned.clone();
        let otherwise = self.label();
        let test = self.lower_jump(cond, false, otherwise);
        let (then_code, then_completes) = self.scoped(|this| this.lower_stmt(then_branch));
        let then_state = std::mem::replace(&mut self.assigned, pre.clone());

        let Some(else_branch) = else_branch else {
            self.assigned = pre
                .clone()
                .combine_with(FieldAssignment::branch(then_state))
                .intersect(FieldAssignment::branch(pre));
            return (test.concat(then_code).add(Instruction::Label(otherwise)), true);
        };

        let end = self.label();
        let (else_code, else_completes) = self.scoped(|this| this.lower_stmt(else_branch));
        let else_state = std::mem::take(&mut self.assigned);
        self.assigned = pre
            .combine_with(FieldAssignment::branch(then_state))
            .intersect(FieldAssignment::branch(else_state));

        let mut code = test.concat(then_code);
        if then_completes {
            code = code.add(Instruction::Jump(JumpOp::Goto, end));
        }
        let code = code
            .add(Instruction::Label(otherwise))
            .concat(else_code)
            .add(Instruction::Label(end));
        (code, then_completes || else_completes)
    }

    /// `while` and `for` share one shape: test, body, step, back edge.
    fn lower_loop(&mut self, cond: Option<&Expr>, step: Option<&Stmt>, body: &Stmt) -> Lowered {
        let pre = self.assigned.clone();
        let infinite = cond.map_or(true, is_true);
        let (top, exit) = (self.label(), self.label());

        let test = match cond {
            Some(cond) => self.lower_jump(cond, false, exit),
            None => Fragment::empty(),
        };
        let (body_code, _) = self.scoped(|this| this.lower_stmt(body));
        let step_code = match step {
            Some(step) => self.lower_stmt(step).0,
            None => Fragment::empty(),
        };
        self.assigned = if infinite { FieldAssignment::Total } else { pre };

        let code = Fragment::empty()
            .add(Instruction::Label(top))
            .concat(test)
            .concat(body_code)
            .concat(step_code)
            .add(Instruction::Jump(JumpOp::Goto, top))
            .add(Instruction::Label(exit));
        (code, !infinite)
    }

    fn lower_return(&mut self, value: Option<&Expr>, at: Coordinate) -> Fragment {
        let return_type = self.return_type.clone();
        let fragment = match value {
            None if return_type.is_void() => Fragment::empty().add(Instruction::Op(Opcode::Return)),
            None => Fragment::from_error(crate::lower::type_error(at, "Missing return value")),
            Some(value) if return_type.is_void() => self.lower_expr(value).add_error(crate::lower::type_error(
                at,
                "Cannot return a value from a method returning Void",
            )),
            Some(value) => {
                let from = self.type_of(value);
                let mut fragment = self.lower_expr(value);
                if !self.assignable(value, &from, &return_type) {
                    fragment = fragment.add_error(crate::lower::type_error(
                        at,
                        format!("Cannot return expression of type {from} from a method returning {return_type}"),
                    ));
                }
                fragment
                    .add_all(from.coerce_to(&return_type, self.env))
                    .add(Instruction::Op(return_type.local_kind().return_op()))
            }
        };
        self.assigned = FieldAssignment::Total;
        fragment
    }

    /// The statements of a constructor body after its leading `super(...)`
    /// or `this(...)`, which the caller lowers.
    pub(crate) fn constructor_call_of(stmt: &Stmt) -> Option<(bool, &[Expr])> {
        match &stmt.kind {
            StmtKind::Expr(Expr {
                kind: ExprKind::SuperCall(args),
                ..
            }) => Some((false, args.as_slice())),
            StmtKind::Expr(Expr {
                kind: ExprKind::ThisCall(args),
                ..
            }) => Some((true, args.as_slice())),
            _ => None,
        }
    }
}
