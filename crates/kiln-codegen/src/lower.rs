//! The lowering context shared by expression and statement lowering.

use std::collections::HashSet;

use kiln_classfile::{Constant, Instruction, Label};
use kiln_core::{Coordinate, Diagnostic};
use kiln_flow::FieldAssignment;
use kiln_syntax::ast::{Expr, ExprKind, Literal, UnaryOp};
use kiln_types::{FieldDef, Type, TypeEnv};

use crate::codes;
use crate::resolve::Scope;
use crate::variables::{Constants, Variables};

/// The class whose members are being lowered.
#[derive(Debug, Clone)]
pub(crate) struct ClassContext {
    /// Dotted binary name.
    pub name: String,
    /// The class as seen from its own body.
    pub this_type: Type,
    pub super_type: Type,
    /// Instance fields the class itself declares.
    pub own_fields: HashSet<String>,
}

impl ClassContext {
    pub fn internal_name(&self) -> String {
        self.name.replace('.', "/")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyKind {
    Method,
    Constructor,
    /// Field initialisers, lowered on their own.
    Initializer,
}

/// Lowers one method, constructor or initialiser body.
pub(crate) struct Lowerer<'a> {
    pub env: &'a dyn TypeEnv,
    pub scope: &'a Scope,
    pub class: &'a ClassContext,
    pub is_static: bool,
    pub kind: BodyKind,
    pub return_type: Type,
    pub vars: Variables,
    /// Fields definitely assigned at the current point.
    pub assigned: FieldAssignment,
    substitutable: HashSet<String>,
    next_label: u32,
}

impl<'a> Lowerer<'a> {
    pub fn new(
        env: &'a dyn TypeEnv,
        scope: &'a Scope,
        class: &'a ClassContext,
        is_static: bool,
        kind: BodyKind,
        constants: Constants,
    ) -> Self {
        Self {
            env,
            scope,
            class,
            is_static,
            kind,
            return_type: Type::void(),
            vars: Variables::new(is_static).with_constants(constants),
            assigned: FieldAssignment::Total,
            substitutable: HashSet::new(),
            next_label: 0,
        }
    }

    #[must_use]
    pub fn returning(mut self, ty: Type) -> Self {
        self.return_type = ty;
        self
    }

    /// Locals whose reads may lower their literal initialiser.
    #[must_use]
    pub fn substituting(mut self, names: HashSet<String>) -> Self {
        self.substitutable = names;
        self
    }

    pub fn is_substitutable(&self, name: &str) -> bool {
        self.substitutable.contains(name)
    }

    pub fn label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn max_locals(&self) -> u16 {
        self.vars.max_locals()
    }

    /// Pending-access diagnostics; call once the body is lowered.
    pub fn finish(self) -> Vec<Diagnostic> {
        self.vars.finish()
    }

    /// A field of the class reachable without a receiver.
    pub fn implicit_field(&self, name: &str) -> Option<FieldDef> {
        self.class.this_type.field_named(name, self.env)
    }

    /// Whether a leading name denotes a value rather than a type.
    fn names_value(&self, name: &str) -> bool {
        self.vars.lookup(name).is_some()
            || self.vars.constant(name).is_some()
            || self.implicit_field(name).is_some()
    }

    /// The class a name or dotted name denotes, for static access.
    pub fn as_type_name(&self, expr: &Expr) -> Option<Type> {
        let dotted = expr.dotted_name()?;
        let head = dotted.split('.').next().unwrap_or(&dotted);
        if self.names_value(head) {
            return None;
        }
        self.scope
            .class_name(&dotted, self.env)
            .map(Type::Reference)
    }

    /// The expression's type is `Null` because something inside it did not
    /// resolve, and that was already reported.
    pub fn is_unresolved(&self, expr: &Expr) -> bool {
        !matches!(expr.kind, ExprKind::Literal(Literal::Null)) && self.type_of(expr) == Type::Null
    }

    /// Reads of a field declared by this class, inside a constructor, must
    /// follow an assignment.
    pub fn check_field_read(&self, field: &FieldDef, at: Coordinate) -> Option<Diagnostic> {
        let tracked = self.kind == BodyKind::Constructor
            && !field.is_static()
            && field.owner == self.class.name
            && self.class.own_fields.contains(&field.name);
        (tracked && !self.assigned.contains(&field.name)).then(|| kiln_flow::unassigned_field(&field.name, at))
    }

    pub fn this_load(&self) -> Instruction {
        Instruction::Load(kiln_classfile::LocalKind::Reference, 0)
    }
}

pub(crate) fn type_error(at: Coordinate, message: impl Into<String>) -> Diagnostic {
    Diagnostic::error(codes::TYPE, at, message)
}

pub(crate) fn internal(binary_name: &str) -> String {
    binary_name.replace('.', "/")
}

/// The value of an integer literal, negated literals included.
pub(crate) fn int_constant(expr: &Expr) -> Option<i32> {
    match &expr.kind {
        ExprKind::Literal(Literal::Int(v)) => Some(*v),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => int_constant(operand).and_then(i32::checked_neg),
        _ => None,
    }
}

/// An `Int` literal narrows implicitly to `Byte`, `Short` or `Char` when the
/// value fits.
pub(crate) fn fits_narrow(value: i32, to: &Type) -> bool {
    use kiln_types::PrimitiveType::*;
    match to.as_primitive() {
        Some(Byte) => i8::try_from(value).is_ok(),
        Some(Short) => i16::try_from(value).is_ok(),
        Some(Char) => u16::try_from(value).is_ok(),
        _ => false,
    }
}

pub(crate) fn push_int(value: i32) -> Instruction {
    Instruction::Push(Constant::Int(value))
}
