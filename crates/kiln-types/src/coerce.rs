//! Instruction sequences converting a value between types.

use kiln_classfile::{Instruction, InvokeKind, Opcode, TypeOp};

use crate::assign::ARRAY_SUPERTYPES;
use crate::class::TypeEnv;
use crate::ty::{PrimitiveType, Type};

/// The single VM conversion between two primitives, if any.
pub fn primitive_conversion(from: PrimitiveType, to: PrimitiveType) -> Option<Opcode> {
    use PrimitiveType::*;
    let op = match (from, to) {
        (Long, Int) => Opcode::L2i,
        (Long, Float) => Opcode::L2f,
        (Long, Num) => Opcode::L2d,
        (Float, Int) => Opcode::F2i,
        (Float, Long) => Opcode::F2l,
        (Float, Num) => Opcode::F2d,
        (Num, Int) => Opcode::D2i,
        (Num, Long) => Opcode::D2l,
        (Num, Float) => Opcode::D2f,
        (Long | Float | Num, _) => return None,
        (_, Long) => Opcode::I2l,
        (_, Float) => Opcode::I2f,
        (_, Num) => Opcode::I2d,
        (Char | Short | Int, Byte) => Opcode::I2b,
        (Byte | Short | Int, Char) => Opcode::I2c,
        (Char | Int, Short) => Opcode::I2s,
        _ => return None,
    };
    Some(op)
}

fn boxing(p: PrimitiveType) -> Instruction {
    let class = p.box_class().replace('.', "/");
    Instruction::Invoke {
        kind: InvokeKind::Static,
        descriptor: format!("({})L{};", p.descriptor(), class),
        owner: class,
        name: "valueOf".to_string(),
        interface: false,
    }
}

fn unboxing(p: PrimitiveType) -> Instruction {
    Instruction::Invoke {
        kind: InvokeKind::Virtual,
        owner: p.box_class().replace('.', "/"),
        name: p.unbox_method().to_string(),
        descriptor: format!("(){}", p.descriptor()),
        interface: false,
    }
}

fn checkcast(to: &Type) -> Instruction {
    Instruction::Type(TypeOp::Checkcast, to.internal_name())
}

impl Type {
    /// Instructions converting a value of this type, already on the stack,
    /// to `to`. Only meaningful when `self.is_assignable_to(to)`.
    pub fn coerce_to(&self, to: &Type, env: &dyn TypeEnv) -> Vec<Instruction> {
        if self == to {
            return Vec::new();
        }
        match (self, to) {
            (Type::Generic { erasure, actual }, _) => {
                let mut out = Vec::new();
                let vm = erasure.erasure();
                let wanted = actual.erasure();
                if wanted != vm && wanted.is_reference() && !wanted.is_object() {
                    out.push(checkcast(&wanted));
                }
                // The VM value is now an `actual`.
                let as_actual = if wanted.is_reference() { actual.as_ref() } else { erasure.as_ref() };
                out.extend(as_actual.coerce_to(to, env));
                out
            }
            (_, Type::Generic { actual, .. }) => self.coerce_to(actual, env),
            (Type::Null, Type::Primitive(p)) => {
                let mut out = vec![checkcast(&Type::reference(p.box_class()))];
                out.push(unboxing(*p));
                out
            }
            (Type::Primitive(from), Type::Primitive(to)) => {
                primitive_conversion(*from, *to).map(Instruction::Op).into_iter().collect()
            }
            (Type::Primitive(p), _) => vec![boxing(*p)],
            (Type::Reference(name), Type::Primitive(p)) => {
                let mut out = Vec::new();
                if PrimitiveType::from_box(name) != Some(*p) {
                    out.push(checkcast(&Type::reference(p.box_class())));
                }
                out.push(unboxing(*p));
                out
            }
            (Type::Array(element), target)
                if element.is_reference()
                    && target
                        .class_name()
                        .is_some_and(|name| !ARRAY_SUPERTYPES.contains(&name)) =>
            {
                vec![Instruction::Invoke {
                    kind: InvokeKind::Static,
                    owner: "java/util/Arrays".to_string(),
                    name: "asList".to_string(),
                    descriptor: "([Ljava/lang/Object;)Ljava/util/List;".to_string(),
                    interface: false,
                }]
            }
            _ => Vec::new(),
        }
    }

    /// Explicit `as` conversion, including narrowing and downcasts. `None`
    /// when no conversion exists.
    pub fn cast_to(&self, to: &Type, env: &dyn TypeEnv) -> Option<Vec<Instruction>> {
        if self.is_assignable_to(to, env) {
            return Some(self.coerce_to(to, env));
        }
        if to.is_void() || self.is_void() {
            return None;
        }
        match (self, to) {
            (Type::Generic { .. }, _) => {
                let actual = self.actual().clone();
                let mut out = self.coerce_to(&actual, env);
                out.extend(actual.cast_to(to, env)?);
                Some(out)
            }
            (Type::Primitive(from), Type::Primitive(target)) => {
                // Bool only converts where it widens, handled above.
                if *from == PrimitiveType::Bool || *target == PrimitiveType::Bool {
                    return None;
                }
                let mut out = Vec::new();
                // Narrowing from a wide type to a sub-int type goes through int.
                let via_int = matches!(from, PrimitiveType::Long | PrimitiveType::Float | PrimitiveType::Num)
                    && matches!(target, PrimitiveType::Byte | PrimitiveType::Char | PrimitiveType::Short);
                if via_int {
                    out.extend(primitive_conversion(*from, PrimitiveType::Int).map(Instruction::Op));
                    out.extend(primitive_conversion(PrimitiveType::Int, *target).map(Instruction::Op));
                } else {
                    out.extend(primitive_conversion(*from, *target).map(Instruction::Op));
                }
                Some(out)
            }
            (Type::Primitive(p), _) => {
                let boxed = Type::reference(p.box_class());
                let mut out = vec![boxing(*p)];
                out.extend(boxed.cast_to(to, env)?);
                Some(out)
            }
            (_, Type::Primitive(p)) => {
                // Through the wrapper: `Object as Int`.
                let boxed = Type::reference(p.box_class());
                if !boxed.is_assignable_to(&self.erasure(), env) && !matches!(self, Type::Attempted(_)) {
                    return None;
                }
                Some(vec![checkcast(&boxed), unboxing(*p)])
            }
            (Type::Attempted(_) | Type::Variable(_) | Type::Bounded { .. } | Type::Intersection(_), _) => {
                Some(vec![checkcast(&to.erasure())])
            }
            _ => {
                let downcast = to.is_assignable_to(self, env);
                let through_interface = [self, to].iter().any(|t| {
                    t.class_name()
                        .and_then(|name| env.class(name))
                        .is_some_and(|def| def.is_interface())
                });
                (downcast || through_interface || to.is_generic()).then(|| vec![checkcast(&to.erasure())])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::Classes;
    use crate::jdk::BuiltinJdk;
    use kiln_classfile::Opcode;

    fn env() -> Classes {
        Classes::new(Arc::new(BuiltinJdk))
    }

    #[test]
    fn bool_casts_only_where_it_widens() {
        use PrimitiveType::*;
        let env = env();
        let bool_ty = Type::Primitive(Bool);
        assert_eq!(
            bool_ty.cast_to(&Type::Primitive(Long), &env),
            Some(vec![Instruction::Op(Opcode::I2l)])
        );
        assert_eq!(
            bool_ty.cast_to(&Type::Primitive(Num), &env),
            Some(vec![Instruction::Op(Opcode::I2d)])
        );
        assert_eq!(bool_ty.cast_to(&Type::Primitive(Int), &env), None);
        assert_eq!(Type::Primitive(Long).cast_to(&bool_ty, &env), None);
    }

    #[test]
    fn unboxing_needs_the_exact_wrapper() {
        let env = env();
        let integer = Type::reference("java.lang.Integer");
        let int = Type::Primitive(PrimitiveType::Int);
        let long = Type::Primitive(PrimitiveType::Long);
        assert!(integer.is_assignable_to(&int, &env));
        assert!(!integer.is_assignable_to(&long, &env));
        assert_eq!(integer.cast_to(&long, &env), None);
    }

    #[test]
    fn conversion_table_is_closed() {
        use PrimitiveType::*;
        assert_eq!(primitive_conversion(Int, Long), Some(Opcode::I2l));
        assert_eq!(primitive_conversion(Char, Num), Some(Opcode::I2d));
        assert_eq!(primitive_conversion(Num, Float), Some(Opcode::D2f));
        assert_eq!(primitive_conversion(Byte, Int), None);
        assert_eq!(primitive_conversion(Int, Int), None);
        assert_eq!(primitive_conversion(Int, Byte), Some(Opcode::I2b));
        assert_eq!(primitive_conversion(Byte, Byte), None);
        assert_eq!(primitive_conversion(Short, Char), Some(Opcode::I2c));
    }
}
