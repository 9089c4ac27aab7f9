//! Opcode selection by operand type.

use kiln_classfile::{Constant, Instruction, LocalKind, Opcode, TypeOp};
use kiln_syntax::ast::BinaryOp;
use kiln_types::{PrimitiveType, Type};

pub(crate) fn arithmetic(op: BinaryOp, kind: LocalKind) -> Option<Opcode> {
    use LocalKind::*;
    let table = match op {
        BinaryOp::Add => [Opcode::Iadd, Opcode::Ladd, Opcode::Fadd, Opcode::Dadd],
        BinaryOp::Sub => [Opcode::Isub, Opcode::Lsub, Opcode::Fsub, Opcode::Dsub],
        BinaryOp::Mul => [Opcode::Imul, Opcode::Lmul, Opcode::Fmul, Opcode::Dmul],
        BinaryOp::Div => [Opcode::Idiv, Opcode::Ldiv, Opcode::Fdiv, Opcode::Ddiv],
        BinaryOp::Rem => [Opcode::Irem, Opcode::Lrem, Opcode::Frem, Opcode::Drem],
        _ => return None,
    };
    match kind {
        Int => Some(table[0]),
        Long => Some(table[1]),
        Float => Some(table[2]),
        Double => Some(table[3]),
        Reference => None,
    }
}

pub(crate) fn negate(kind: LocalKind) -> Option<Opcode> {
    match kind {
        LocalKind::Int => Some(Opcode::Ineg),
        LocalKind::Long => Some(Opcode::Lneg),
        LocalKind::Float => Some(Opcode::Fneg),
        LocalKind::Double => Some(Opcode::Dneg),
        LocalKind::Reference => None,
    }
}

/// `Bool` and `Byte` arrays share `baload`/`bastore`.
pub(crate) fn array_load(element: &Type) -> Opcode {
    match element.erasure() {
        Type::Primitive(PrimitiveType::Bool | PrimitiveType::Byte) => Opcode::Baload,
        Type::Primitive(PrimitiveType::Char) => Opcode::Caload,
        Type::Primitive(PrimitiveType::Short) => Opcode::Saload,
        other => other.local_kind().array_load(),
    }
}

pub(crate) fn array_store(element: &Type) -> Opcode {
    match element.erasure() {
        Type::Primitive(PrimitiveType::Bool | PrimitiveType::Byte) => Opcode::Bastore,
        Type::Primitive(PrimitiveType::Char) => Opcode::Castore,
        Type::Primitive(PrimitiveType::Short) => Opcode::Sastore,
        other => match other.local_kind() {
            LocalKind::Int => Opcode::Iastore,
            LocalKind::Long => Opcode::Lastore,
            LocalKind::Float => Opcode::Fastore,
            LocalKind::Double => Opcode::Dastore,
            LocalKind::Reference => Opcode::Aastore,
        },
    }
}

/// `newarray` or `anewarray` for an array of `element`.
pub(crate) fn new_array(element: &Type) -> Instruction {
    match element.as_primitive().and_then(PrimitiveType::array_type) {
        Some(kind) => Instruction::NewArray(kind),
        None => Instruction::Type(TypeOp::Anewarray, element.internal_name()),
    }
}

/// Discards a value of the given width.
pub(crate) fn pop(width: u16) -> Option<Instruction> {
    match width {
        0 => None,
        1 => Some(Instruction::Op(Opcode::Pop)),
        _ => Some(Instruction::Op(Opcode::Pop2)),
    }
}

/// The value an uninitialised local starts with.
pub(crate) fn zero(ty: &Type) -> Instruction {
    let constant = match ty.local_kind() {
        LocalKind::Int => Constant::Int(0),
        LocalKind::Long => Constant::Long(0),
        LocalKind::Float => Constant::Float(0.0),
        LocalKind::Double => Constant::Double(0.0),
        LocalKind::Reference => Constant::Null,
    };
    Instruction::Push(constant)
}

/// The primitive a value takes part in arithmetic as: primitives as
/// themselves, wrappers unboxed.
pub(crate) fn unboxed(ty: &Type) -> Option<PrimitiveType> {
    match ty.actual() {
        Type::Primitive(PrimitiveType::Void) => None,
        Type::Primitive(p) => Some(*p),
        Type::Reference(name) => PrimitiveType::from_box(name),
        _ => None,
    }
}

/// Binary numeric promotion: the narrowest of `Int`, `Long`, `Float` and
/// `Num` both operands widen to. `Long` with `Float` meets at `Num`.
pub(crate) fn promote(a: PrimitiveType, b: PrimitiveType) -> Option<PrimitiveType> {
    if a == PrimitiveType::Bool || b == PrimitiveType::Bool || !a.is_numeric() || !b.is_numeric() {
        return None;
    }
    [
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::Float,
        PrimitiveType::Num,
    ]
    .into_iter()
    .find(|p| a.widens_to(*p) && b.widens_to(*p))
}

/// `StringBuilder.append` / `String.valueOf` parameter descriptor for a value.
pub(crate) fn string_conversion_descriptor(ty: &Type) -> &'static str {
    match ty.as_primitive() {
        Some(PrimitiveType::Bool) => "Z",
        Some(PrimitiveType::Char) => "C",
        Some(PrimitiveType::Byte | PrimitiveType::Short | PrimitiveType::Int) => "I",
        Some(PrimitiveType::Long) => "J",
        Some(PrimitiveType::Float) => "F",
        Some(PrimitiveType::Num) => "D",
        _ if ty.is_string() => "Ljava/lang/String;",
        _ => "Ljava/lang/Object;",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn promotion_follows_widening() {
        use PrimitiveType::*;
        assert_eq!(promote(Byte, Short), Some(Int));
        assert_eq!(promote(Char, Int), Some(Int));
        assert_eq!(promote(Int, Long), Some(Long));
        assert_eq!(promote(Int, Float), Some(Float));
        assert_eq!(promote(Long, Float), Some(Num));
        assert_eq!(promote(Num, Byte), Some(Num));
        assert_eq!(promote(Bool, Int), None);
    }

    #[test]
    fn sub_int_arrays_use_their_own_opcodes() {
        use PrimitiveType::*;
        assert_eq!(array_load(&Type::Primitive(Bool)), Opcode::Baload);
        assert_eq!(array_store(&Type::Primitive(Char)), Opcode::Castore);
        assert_eq!(array_load(&Type::Primitive(Short)), Opcode::Saload);
        assert_eq!(array_load(&Type::Primitive(Long)), Opcode::Laload);
        assert_eq!(array_store(&Type::string()), Opcode::Aastore);
    }

    #[test]
    fn wrappers_unbox_for_arithmetic() {
        assert_eq!(unboxed(&Type::reference("java.lang.Long")), Some(PrimitiveType::Long));
        assert_eq!(unboxed(&Type::string()), None);
        assert_eq!(unboxed(&Type::void()), None);
    }
}
