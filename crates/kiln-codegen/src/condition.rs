//! Conditions lowered straight to jumps.

use kiln_classfile::{Instruction, InvokeKind, JumpOp, Label, Opcode};
use kiln_core::Coordinate;
use kiln_syntax::ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use kiln_types::{PrimitiveType, Type};

use crate::fragment::Fragment;
use crate::lower::{push_int, type_error, Lowerer};
use crate::ops;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    fn of(op: BinaryOp) -> Option<Self> {
        Some(match op {
            BinaryOp::Eq => Relation::Eq,
            BinaryOp::Ne => Relation::Ne,
            BinaryOp::Lt => Relation::Lt,
            BinaryOp::Le => Relation::Le,
            BinaryOp::Gt => Relation::Gt,
            BinaryOp::Ge => Relation::Ge,
            _ => return None,
        })
    }

    fn is_equality(self) -> bool {
        matches!(self, Relation::Eq | Relation::Ne)
    }

    /// Jump taken when the relation holds between a value and zero.
    fn against_zero(self) -> JumpOp {
        match self {
            Relation::Eq => JumpOp::Ifeq,
            Relation::Ne => JumpOp::Ifne,
            Relation::Lt => JumpOp::Iflt,
            Relation::Le => JumpOp::Ifle,
            Relation::Gt => JumpOp::Ifgt,
            Relation::Ge => JumpOp::Ifge,
        }
    }

    /// Jump taken when the relation holds between two ints.
    fn between_ints(self) -> JumpOp {
        match self {
            Relation::Eq => JumpOp::IfIcmpeq,
            Relation::Ne => JumpOp::IfIcmpne,
            Relation::Lt => JumpOp::IfIcmplt,
            Relation::Le => JumpOp::IfIcmple,
            Relation::Gt => JumpOp::IfIcmpgt,
            Relation::Ge => JumpOp::IfIcmpge,
        }
    }

    /// NaN must make the relation false, so `<` and `<=` compare with
    /// the variant that yields 1 on NaN.
    fn nan_high(self) -> bool {
        matches!(self, Relation::Lt | Relation::Le)
    }
}

fn is_null_literal(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(Literal::Null))
}

impl Lowerer<'_> {
    /// Jump to `target` when `expr` evaluates to `when`; fall through
    /// otherwise.
    pub fn lower_jump(&mut self, expr: &Expr, when: bool, target: Label) -> Fragment {
        match &expr.kind {
            ExprKind::Literal(Literal::Bool(value)) => {
                if *value == when {
                    Fragment::empty().add(Instruction::Jump(JumpOp::Goto, target))
                } else {
                    Fragment::empty()
                }
            }
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.lower_jump(operand, !when, target),
            ExprKind::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => {
                if when {
                    let skip = self.label();
                    self.lower_jump(lhs, false, skip)
                        .concat(self.lower_jump(rhs, true, target))
                        .add(Instruction::Label(skip))
                } else {
                    self.lower_jump(lhs, false, target)
                        .concat(self.lower_jump(rhs, false, target))
                }
            }
            ExprKind::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => {
                if when {
                    self.lower_jump(lhs, true, target)
                        .concat(self.lower_jump(rhs, true, target))
                } else {
                    let skip = self.label();
                    self.lower_jump(lhs, true, skip)
                        .concat(self.lower_jump(rhs, false, target))
                        .add(Instruction::Label(skip))
                }
            }
            ExprKind::Binary { op, lhs, rhs } => match Relation::of(*op) {
                Some(relation) => self.lower_comparison(relation, *op, lhs, rhs, when, target, expr.at),
                None => self.lower_bool_jump(expr, when, target),
            },
            _ => self.lower_bool_jump(expr, when, target),
        }
    }

    fn lower_bool_jump(&mut self, expr: &Expr, when: bool, target: Label) -> Fragment {
        let ty = self.type_of(expr);
        let fragment = self.lower_expr(expr);
        if ops::unboxed(&ty) == Some(PrimitiveType::Bool) {
            let jump = if when { JumpOp::Ifne } else { JumpOp::Ifeq };
            return fragment
                .add_all(ty.coerce_to(&Type::boolean(), self.env))
                .add(Instruction::Jump(jump, target));
        }
        if self.is_unresolved(expr) {
            return fragment;
        }
        fragment.add_error(type_error(
            expr.at,
            format!("Condition must be of type Bool, found {ty}"),
        ))
    }

    /// A condition as a `Bool` value: 1 or 0.
    pub(crate) fn materialize(&mut self, expr: &Expr) -> Fragment {
        let (otherwise, end) = (self.label(), self.label());
        self.lower_jump(expr, false, otherwise)
            .add(push_int(1))
            .add(Instruction::Jump(JumpOp::Goto, end))
            .add(Instruction::Label(otherwise))
            .add(push_int(0))
            .add(Instruction::Label(end))
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_comparison(
        &mut self,
        relation: Relation,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        when: bool,
        target: Label,
        at: Coordinate,
    ) -> Fragment {
        let (lt, rt) = (self.type_of(lhs), self.type_of(rhs));
        let jump = |holds: JumpOp| {
            let op = if when { holds } else { holds.negate() };
            Instruction::Jump(op, target)
        };

        if self.is_unresolved(lhs) || self.is_unresolved(rhs) {
            return self.lower_expr(lhs).concat(self.lower_expr(rhs));
        }
        let mismatch = |lowerer: &mut Self| {
            lowerer
                .lower_expr(lhs)
                .concat(lowerer.lower_expr(rhs))
                .add_error(type_error(
                    at,
                    format!("Operator '{}' cannot be applied to {lt} and {rt}", op.symbol()),
                ))
        };

        // Numeric and boolean comparison, unboxing a wrapper against a
        // primitive. Two wrappers compare as references.
        if lt.is_primitive() || rt.is_primitive() {
            let (Some(a), Some(b)) = (ops::unboxed(&lt), ops::unboxed(&rt)) else {
                return mismatch(self);
            };
            if a == PrimitiveType::Bool && b == PrimitiveType::Bool {
                if !relation.is_equality() {
                    return mismatch(self);
                }
                return self
                    .lower_coerced(lhs, &Type::boolean())
                    .concat(self.lower_coerced(rhs, &Type::boolean()))
                    .add(jump(relation.between_ints()));
            }
            let Some(p) = ops::promote(a, b) else {
                return mismatch(self);
            };
            let left = self.lower_expr(lhs).add_all(self.numeric_coercion(&lt, p));
            let both = left
                .concat(self.lower_expr(rhs))
                .add_all(self.numeric_coercion(&rt, p));
            return match p {
                PrimitiveType::Long => both
                    .add(Instruction::Op(Opcode::Lcmp))
                    .add(jump(relation.against_zero())),
                PrimitiveType::Float => {
                    let compare = if relation.nan_high() { Opcode::Fcmpg } else { Opcode::Fcmpl };
                    both.add(Instruction::Op(compare)).add(jump(relation.against_zero()))
                }
                PrimitiveType::Num => {
                    let compare = if relation.nan_high() { Opcode::Dcmpg } else { Opcode::Dcmpl };
                    both.add(Instruction::Op(compare)).add(jump(relation.against_zero()))
                }
                _ => both.add(jump(relation.between_ints())),
            };
        }

        if !relation.is_equality() {
            return mismatch(self);
        }
        let null_test = if relation == Relation::Eq { JumpOp::Ifnull } else { JumpOp::Ifnonnull };
        if is_null_literal(rhs) {
            return self.lower_expr(lhs).add(jump(null_test));
        }
        if is_null_literal(lhs) {
            return self.lower_expr(rhs).add(jump(null_test));
        }
        if lt.is_string() && rt.is_string() {
            let (left, _) = self.lower_value(lhs);
            let equals_holds = if relation == Relation::Eq { JumpOp::Ifne } else { JumpOp::Ifeq };
            return left
                .concat(self.lower_expr(rhs))
                .add(Instruction::Invoke {
                    kind: InvokeKind::Virtual,
                    owner: "java/lang/String".to_string(),
                    name: "equals".to_string(),
                    descriptor: "(Ljava/lang/Object;)Z".to_string(),
                    interface: false,
                })
                .add(jump(equals_holds));
        }
        let same = if relation == Relation::Eq { JumpOp::IfAcmpeq } else { JumpOp::IfAcmpne };
        self.lower_expr(lhs).concat(self.lower_expr(rhs)).add(jump(same))
    }
}
