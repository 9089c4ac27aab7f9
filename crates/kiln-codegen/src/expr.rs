//! Expression typing and lowering.

use kiln_classfile::{Constant, FieldOp, Instruction, InvokeKind, Opcode, TypeOp};
use kiln_core::{Coordinate, Diagnostic};
use kiln_syntax::ast::{BinaryOp, Expr, ExprKind, Literal, TypeRef, UnaryOp};
use kiln_types::{FieldDef, PrimitiveType, Type};

use crate::codes;
use crate::fragment::Fragment;
use crate::lower::{internal, int_constant, push_int, type_error, Lowerer};
use crate::ops;

const STRING_BUILDER: &str = "java/lang/StringBuilder";

pub(crate) fn literal_type(literal: &Literal) -> Type {
    match literal {
        Literal::Int(_) => Type::int(),
        Literal::Long(_) => PrimitiveType::Long.into(),
        Literal::Float(_) => PrimitiveType::Float.into(),
        Literal::Num(_) => PrimitiveType::Num.into(),
        Literal::Char(_) => PrimitiveType::Char.into(),
        Literal::Str(_) => Type::string(),
        Literal::Bool(_) => Type::boolean(),
        Literal::Null => Type::Null,
    }
}

fn literal_instruction(literal: &Literal) -> Instruction {
    let constant = match literal {
        Literal::Int(v) => Constant::Int(*v),
        Literal::Long(v) => Constant::Long(*v),
        Literal::Float(v) => Constant::Float(*v),
        Literal::Num(v) => Constant::Double(*v),
        Literal::Char(c) => Constant::Int(i32::from(*c)),
        Literal::Str(s) => Constant::String(s.clone()),
        Literal::Bool(b) => Constant::Int(i32::from(*b)),
        Literal::Null => Constant::Null,
    };
    Instruction::Push(constant)
}

/// A literal negated at compile time.
fn negated_literal(expr: &Expr) -> Option<Instruction> {
    if let Some(value) = int_constant(expr) {
        return Some(push_int(value));
    }
    let ExprKind::Unary {
        op: UnaryOp::Neg,
        operand,
    } = &expr.kind
    else {
        return None;
    };
    let constant = match &operand.kind {
        ExprKind::Literal(Literal::Long(v)) => Constant::Long(v.checked_neg()?),
        ExprKind::Literal(Literal::Float(v)) => Constant::Float(-*v),
        ExprKind::Literal(Literal::Num(v)) => Constant::Double(-*v),
        _ => return None,
    };
    Some(Instruction::Push(constant))
}

pub(crate) fn unknown_field(name: &str, owner: &Type, at: Coordinate) -> Diagnostic {
    Diagnostic::error(
        codes::UNKNOWN_FIELD,
        at,
        format!("Unknown field '{name}' for type {owner}"),
    )
}

pub(crate) fn field_instruction(field: &FieldDef, op: FieldOp) -> Instruction {
    Instruction::Field {
        op,
        owner: internal(&field.owner),
        name: field.name.clone(),
        descriptor: field.ty.descriptor(),
    }
}

impl Lowerer<'_> {
    /// The static type of `expr`. Never reports; anything that does not
    /// resolve is `Null`.
    pub fn type_of(&self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Literal(literal) => literal_type(literal),
            ExprKind::Name(name) => self.name_type(name),
            ExprKind::This => self.class.this_type.clone(),
            ExprKind::Field { target, name } => self.field_type(target, name),
            ExprKind::Call { target, name, args } => self.call_type(target.as_deref(), name, args),
            ExprKind::SuperCall(_) | ExprKind::ThisCall(_) => Type::void(),
            ExprKind::New { ty, .. } => self.scope.resolve(ty, self.env).unwrap_or(Type::Null),
            ExprKind::NewArray { element, .. } => self
                .scope
                .resolve(element, self.env)
                .map(Type::array_of)
                .unwrap_or(Type::Null),
            ExprKind::Index { target, .. } => match self.type_of(target).actual() {
                Type::Array(element) => element.as_ref().clone(),
                _ => Type::Null,
            },
            ExprKind::Unary {
                op: UnaryOp::Not, ..
            } => Type::boolean(),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => ops::unboxed(&self.type_of(operand))
                .and_then(|p| ops::promote(p, p))
                .map(Type::Primitive)
                .unwrap_or(Type::Null),
            ExprKind::Binary { op, lhs, rhs } => self.binary_type(*op, lhs, rhs),
            ExprKind::Cast { ty, .. } => self.scope.resolve(ty, self.env).unwrap_or(Type::Null),
            ExprKind::Attempt(inner) => Type::Attempted(Box::new(self.type_of(inner))),
        }
    }

    fn name_type(&self, name: &str) -> Type {
        if let Some(variable) = self.vars.lookup(name) {
            return variable.ty.clone();
        }
        if let Some(constant) = self.vars.constant(name) {
            return constant.ty.clone();
        }
        self.implicit_field(name)
            .map(|field| field.type_through(&self.class.this_type, self.env))
            .unwrap_or(Type::Null)
    }

    fn field_type(&self, target: &Expr, name: &str) -> Type {
        let receiver = match self.as_type_name(target) {
            Some(class) => class,
            None => self.type_of(target).actual().clone(),
        };
        if matches!(receiver, Type::Array(_)) && name == "length" {
            return Type::int();
        }
        receiver
            .field_named(name, self.env)
            .map(|field| field.type_through(&receiver, self.env))
            .unwrap_or(Type::Null)
    }

    fn binary_type(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Type {
        if op.is_comparison() || op.is_logical() {
            return Type::boolean();
        }
        let (lt, rt) = (self.type_of(lhs), self.type_of(rhs));
        if op == BinaryOp::Add && (lt.is_string() || rt.is_string()) {
            return Type::string();
        }
        ops::unboxed(&lt)
            .zip(ops::unboxed(&rt))
            .and_then(|(a, b)| ops::promote(a, b))
            .map(Type::Primitive)
            .unwrap_or(Type::Null)
    }

    pub fn lower_expr(&mut self, expr: &Expr) -> Fragment {
        let at = expr.at;
        match &expr.kind {
            ExprKind::Literal(literal) => Fragment::empty().add(literal_instruction(literal)),
            ExprKind::Name(name) => self.lower_name(name, at),
            ExprKind::This => {
                if self.is_static {
                    Fragment::from_error(type_error(at, "Cannot use 'this' in a static context"))
                } else {
                    Fragment::empty().add(self.this_load())
                }
            }
            ExprKind::Field { target, name } => self.lower_field(target, name, at),
            ExprKind::Call { target, name, args } => self.lower_call(target.as_deref(), name, args, at),
            ExprKind::SuperCall(args) | ExprKind::ThisCall(args) => self
                .lower_all(args)
                .add_error(type_error(at, "A constructor call must be the first statement of a constructor")),
            ExprKind::New { ty, args } => self.lower_new(ty, args, at),
            ExprKind::NewArray { element, length } => self.lower_new_array(element, length, at),
            ExprKind::Index { target, index } => self.lower_index(target, index, at),
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand, expr),
            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_comparison() || op.is_logical() {
                    self.materialize(expr)
                } else if *op == BinaryOp::Add && self.type_of(expr).is_string() {
                    self.lower_concat(expr)
                } else {
                    self.lower_arithmetic(*op, lhs, rhs, at)
                }
            }
            ExprKind::Cast { expr: inner, ty } => self.lower_cast(inner, ty, at),
            ExprKind::Attempt(inner) => self.lower_expr(inner).add_error(type_error(
                at,
                "'attempt' is only allowed as the initializer of a local variable",
            )),
        }
    }

    /// Lower every expression, discarding nothing; for diagnostics of
    /// operands whose use already failed.
    pub(crate) fn lower_all(&mut self, exprs: &[Expr]) -> Fragment {
        exprs.iter().map(|e| self.lower_expr(e)).collect()
    }

    /// Lower `expr` and convert it to `to`.
    pub(crate) fn lower_coerced(&mut self, expr: &Expr, to: &Type) -> Fragment {
        let from = self.type_of(expr);
        self.lower_expr(expr).add_all(from.coerce_to(to, self.env))
    }

    /// Lower a value used as a receiver: a `Generic` value is cast to its
    /// actual type first.
    pub(crate) fn lower_value(&mut self, expr: &Expr) -> (Fragment, Type) {
        let ty = self.type_of(expr);
        let fragment = self.lower_expr(expr);
        match ty {
            Type::Generic { .. } => {
                let actual = ty.actual().clone();
                (fragment.add_all(ty.coerce_to(&actual, self.env)), actual)
            }
            other => (fragment, other),
        }
    }

    /// Whether a value of type `from` produced by `expr` may be stored in
    /// `to`. Int literals narrow when they fit.
    pub(crate) fn assignable(&self, expr: &Expr, from: &Type, to: &Type) -> bool {
        from.is_assignable_to(to, self.env)
            || self.is_unresolved(expr)
            || int_constant(expr).is_some_and(|v| crate::lower::fits_narrow(v, to))
    }

    /// Instructions converting `from` to the primitive `to`, unboxing first.
    pub(crate) fn numeric_coercion(&self, from: &Type, to: PrimitiveType) -> Vec<Instruction> {
        let mut out = Vec::new();
        let mut current = from.clone();
        if !from.is_primitive() {
            if let Some(unboxed) = ops::unboxed(from) {
                out.extend(from.coerce_to(&Type::Primitive(unboxed), self.env));
                current = Type::Primitive(unboxed);
            }
        }
        out.extend(current.coerce_to(&Type::Primitive(to), self.env));
        out
    }

    fn lower_name(&mut self, name: &str, at: Coordinate) -> Fragment {
        if let Some(variable) = self.vars.lookup(name).cloned() {
            if self.is_substitutable(name) {
                if let Some(value) = self.vars.substitution(name).cloned() {
                    return self.lower_coerced(&value, &variable.ty);
                }
            }
            return Fragment::empty().add(Instruction::Load(variable.ty.local_kind(), variable.slot));
        }
        if let Some(constant) = self.vars.constant(name).cloned() {
            return self.lower_coerced(&constant.value, &constant.ty);
        }
        if let Some(field) = self.implicit_field(name) {
            return self.lower_implicit_field(&field, at);
        }
        self.vars.read(name, at);
        Fragment::empty()
    }

    fn lower_implicit_field(&mut self, field: &FieldDef, at: Coordinate) -> Fragment {
        if field.is_static() {
            return Fragment::empty().add(field_instruction(field, FieldOp::GetStatic));
        }
        if self.is_static {
            return Fragment::from_error(type_error(
                at,
                format!("Cannot access instance field '{}' from a static context", field.name),
            ));
        }
        let mut fragment = Fragment::empty();
        if let Some(diagnostic) = self.check_field_read(field, at) {
            fragment = fragment.add_error(diagnostic);
        }
        fragment
            .add(self.this_load())
            .add(field_instruction(field, FieldOp::GetField))
    }

    fn lower_field(&mut self, target: &Expr, name: &str, at: Coordinate) -> Fragment {
        if let Some(class) = self.as_type_name(target) {
            return match class.field_named(name, self.env) {
                Some(field) if field.is_static() => {
                    Fragment::empty().add(field_instruction(&field, FieldOp::GetStatic))
                }
                Some(_) => Fragment::from_error(type_error(
                    at,
                    format!("Cannot access instance field '{name}' of {class} without an instance"),
                )),
                None => Fragment::from_error(unknown_field(name, &class, at)),
            };
        }

        let (receiver, receiver_ty) = self.lower_value(target);
        if self.is_unresolved(target) {
            return receiver;
        }
        if matches!(receiver_ty, Type::Array(_)) && name == "length" {
            return receiver.add(Instruction::Op(Opcode::Arraylength));
        }
        match receiver_ty.field_named(name, self.env) {
            None => receiver.add_error(unknown_field(name, &receiver_ty, at)),
            Some(field) if field.is_static() => receiver
                .add_all(ops::pop(1))
                .add(field_instruction(&field, FieldOp::GetStatic)),
            Some(field) => {
                let mut fragment = receiver;
                if target.kind == ExprKind::This {
                    if let Some(diagnostic) = self.check_field_read(&field, at) {
                        fragment = fragment.add_error(diagnostic);
                    }
                }
                fragment.add(field_instruction(&field, FieldOp::GetField))
            }
        }
    }

    fn lower_new_array(&mut self, element: &TypeRef, length: &Expr, at: Coordinate) -> Fragment {
        let element = match self.scope.resolve(element, self.env) {
            Ok(element) => element,
            Err(diagnostic) => return self.lower_expr(length).add_error(diagnostic),
        };
        let length_ty = self.type_of(length);
        let mut fragment = self.lower_expr(length);
        if element.is_void() {
            return fragment.add_error(type_error(at, "Cannot create an array of Void"));
        }
        if !self.assignable(length, &length_ty, &Type::int()) {
            fragment = fragment.add_error(type_error(
                length.at,
                format!("Array length must be of type Int, found {length_ty}"),
            ));
        }
        fragment
            .add_all(length_ty.coerce_to(&Type::int(), self.env))
            .add(ops::new_array(&element))
    }

    /// Lower an index expression's receiver and index, leaving both on the
    /// stack. `None` when the receiver is not an array.
    pub(crate) fn lower_indexed(&mut self, target: &Expr, index: &Expr) -> (Fragment, Option<Type>) {
        let (mut fragment, target_ty) = self.lower_value(target);
        let element = match &target_ty {
            Type::Array(element) => element.as_ref().clone(),
            _ => {
                if !self.is_unresolved(target) {
                    fragment = fragment.add_error(type_error(
                        target.at,
                        format!("Cannot index a value of type {target_ty}"),
                    ));
                }
                return (fragment.concat(self.lower_expr(index)), None);
            }
        };
        let index_ty = self.type_of(index);
        fragment = fragment.concat(self.lower_expr(index));
        if !self.assignable(index, &index_ty, &Type::int()) {
            fragment = fragment.add_error(type_error(
                index.at,
                format!("Array index must be of type Int, found {index_ty}"),
            ));
        }
        (fragment.add_all(index_ty.coerce_to(&Type::int(), self.env)), Some(element))
    }

    fn lower_index(&mut self, target: &Expr, index: &Expr, _at: Coordinate) -> Fragment {
        match self.lower_indexed(target, index) {
            (fragment, Some(element)) => fragment.add(Instruction::Op(ops::array_load(&element))),
            (fragment, None) => fragment,
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr, expr: &Expr) -> Fragment {
        let ty = self.type_of(operand);
        match op {
            UnaryOp::Not => {
                if ops::unboxed(&ty) != Some(PrimitiveType::Bool) && !self.is_unresolved(operand) {
                    return self
                        .lower_expr(operand)
                        .add_error(type_error(expr.at, format!("Operator '!' cannot be applied to {ty}")));
                }
                self.materialize(expr)
            }
            UnaryOp::Neg => {
                if let Some(constant) = negated_literal(expr) {
                    return Fragment::empty().add(constant);
                }
                let promoted = ops::unboxed(&ty).and_then(|p| ops::promote(p, p));
                let fragment = self.lower_expr(operand);
                match promoted {
                    Some(p) => fragment
                        .add_all(self.numeric_coercion(&ty, p))
                        .add_all(ops::negate(p.local_kind()).map(Instruction::Op)),
                    None if self.is_unresolved(operand) => fragment,
                    None => fragment.add_error(type_error(
                        expr.at,
                        format!("Operator '-' cannot be applied to {ty}"),
                    )),
                }
            }
        }
    }

    fn lower_arithmetic(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, at: Coordinate) -> Fragment {
        let (lt, rt) = (self.type_of(lhs), self.type_of(rhs));
        let promoted = ops::unboxed(&lt)
            .zip(ops::unboxed(&rt))
            .and_then(|(a, b)| ops::promote(a, b));
        let Some(p) = promoted else {
            let fragment = self.lower_expr(lhs).concat(self.lower_expr(rhs));
            if self.is_unresolved(lhs) || self.is_unresolved(rhs) {
                return fragment;
            }
            return fragment.add_error(type_error(
                at,
                format!("Operator '{}' cannot be applied to {lt} and {rt}", op.symbol()),
            ));
        };
        let left = self.lower_expr(lhs).add_all(self.numeric_coercion(&lt, p));
        let right = self.lower_expr(rhs).add_all(self.numeric_coercion(&rt, p));
        left.concat(right)
            .add_all(ops::arithmetic(op, p.local_kind()).map(Instruction::Op))
    }

    fn concat_operands<'e>(&self, expr: &'e Expr, out: &mut Vec<&'e Expr>) {
        if let ExprKind::Binary {
            op: BinaryOp::Add,
            lhs,
            rhs,
        } = &expr.kind
        {
            if self.type_of(expr).is_string() {
                self.concat_operands(lhs, out);
                self.concat_operands(rhs, out);
                return;
            }
        }
        out.push(expr);
    }

    /// String concatenation through one `StringBuilder`.
    fn lower_concat(&mut self, expr: &Expr) -> Fragment {
        let mut operands = Vec::new();
        self.concat_operands(expr, &mut operands);

        let mut fragment = Fragment::empty()
            .add(Instruction::Type(TypeOp::New, STRING_BUILDER.to_string()))
            .add(Instruction::Op(Opcode::Dup))
            .add(Instruction::Invoke {
                kind: InvokeKind::Special,
                owner: STRING_BUILDER.to_string(),
                name: "<init>".to_string(),
                descriptor: "()V".to_string(),
                interface: false,
            });
        for operand in operands {
            let ty = self.type_of(operand);
            fragment = fragment.concat(self.lower_expr(operand));
            if ty.is_void() {
                fragment = fragment.add_error(type_error(operand.at, "Cannot concatenate a Void value"));
                continue;
            }
            let descriptor = ops::string_conversion_descriptor(&ty);
            if !ty.is_primitive() {
                let target = if ty.is_string() { Type::string() } else { Type::object() };
                fragment = fragment.add_all(ty.coerce_to(&target, self.env));
            }
            fragment = fragment.add(Instruction::Invoke {
                kind: InvokeKind::Virtual,
                owner: STRING_BUILDER.to_string(),
                name: "append".to_string(),
                descriptor: format!("({descriptor})Ljava/lang/StringBuilder;"),
                interface: false,
            });
        }
        fragment.add(Instruction::Invoke {
            kind: InvokeKind::Virtual,
            owner: STRING_BUILDER.to_string(),
            name: "toString".to_string(),
            descriptor: "()Ljava/lang/String;".to_string(),
            interface: false,
        })
    }

    fn lower_cast(&mut self, inner: &Expr, ty: &TypeRef, at: Coordinate) -> Fragment {
        let to = match self.scope.resolve(ty, self.env) {
            Ok(to) => to,
            Err(diagnostic) => return self.lower_expr(inner).add_error(diagnostic),
        };
        let from = self.type_of(inner);
        let fragment = self.lower_expr(inner);
        if self.is_unresolved(inner) {
            return fragment;
        }
        match from.cast_to(&to, self.env) {
            Some(conversion) => fragment.add_all(conversion),
            None => fragment.add_error(type_error(at, format!("Cannot cast {from} to {to}"))),
        }
    }

    /// `attempt e` as a whole local initialiser: the value, boxed, or the
    /// `Throwable` it raised. The operand stack is empty on entry, so the
    /// handler's cleared stack loses nothing.
    pub(crate) fn lower_attempt(&mut self, inner: &Expr, at: Coordinate) -> Fragment {
        let inner_ty = self.type_of(inner);
        if inner_ty.is_void() {
            return self
                .lower_expr(inner)
                .add_error(type_error(at, "Cannot attempt an expression of type Void"));
        }
        let (start, end, handler) = (self.label(), self.label(), self.label());
        let body = self.lower_expr(inner).add_all(inner_ty.coerce_to(&Type::object(), self.env));
        Fragment::empty()
            .add(Instruction::TryRange {
                start,
                end,
                handler,
                catch_type: Some(internal(kiln_types::THROWABLE)),
            })
            .add(Instruction::Label(start))
            .concat(body)
            .add(Instruction::Label(end))
            .add(Instruction::Label(handler))
    }
}
