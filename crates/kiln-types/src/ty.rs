use std::collections::HashMap;
use std::fmt;

use kiln_classfile::{ArrayType, LocalKind};

pub const OBJECT: &str = "java.lang.Object";
pub const STRING: &str = "java.lang.String";
pub const THROWABLE: &str = "java.lang.Throwable";
pub const LIST: &str = "java.util.List";
pub const ITERABLE: &str = "java.lang.Iterable";

/// Primitive types, named as they are spelled in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Bool,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    /// 64-bit floating point.
    Num,
    Void,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 9] = [
        PrimitiveType::Bool,
        PrimitiveType::Char,
        PrimitiveType::Byte,
        PrimitiveType::Short,
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::Float,
        PrimitiveType::Num,
        PrimitiveType::Void,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "Bool",
            PrimitiveType::Char => "Char",
            PrimitiveType::Byte => "Byte",
            PrimitiveType::Short => "Short",
            PrimitiveType::Int => "Int",
            PrimitiveType::Long => "Long",
            PrimitiveType::Float => "Float",
            PrimitiveType::Num => "Num",
            PrimitiveType::Void => "Void",
        }
    }

    pub fn descriptor(self) -> char {
        match self {
            PrimitiveType::Bool => 'Z',
            PrimitiveType::Char => 'C',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Float => 'F',
            PrimitiveType::Num => 'D',
            PrimitiveType::Void => 'V',
        }
    }

    pub fn width(self) -> u16 {
        match self {
            PrimitiveType::Void => 0,
            PrimitiveType::Long | PrimitiveType::Num => 2,
            _ => 1,
        }
    }

    /// Widening tier: a value widens to any type in a strictly higher tier.
    fn tier(self) -> u8 {
        match self {
            PrimitiveType::Bool
            | PrimitiveType::Char
            | PrimitiveType::Byte
            | PrimitiveType::Short
            | PrimitiveType::Int => 0,
            PrimitiveType::Long | PrimitiveType::Float => 1,
            PrimitiveType::Num => 2,
            PrimitiveType::Void => u8::MAX,
        }
    }

    /// Implicit primitive widening (reflexive).
    pub fn widens_to(self, to: PrimitiveType) -> bool {
        use PrimitiveType::*;
        if self == Void || to == Void {
            return self == to;
        }
        if self == to {
            return true;
        }
        if self.tier() < to.tier() {
            return true;
        }
        matches!(
            (self, to),
            (Byte, Short) | (Byte, Int) | (Short, Int) | (Char, Int)
        )
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveType::Bool | PrimitiveType::Void)
    }

    /// Integral types that live in an `int` slot.
    pub fn is_int_like(self) -> bool {
        matches!(
            self,
            PrimitiveType::Bool
                | PrimitiveType::Char
                | PrimitiveType::Byte
                | PrimitiveType::Short
                | PrimitiveType::Int
        )
    }

    pub fn local_kind(self) -> LocalKind {
        match self {
            PrimitiveType::Long => LocalKind::Long,
            PrimitiveType::Float => LocalKind::Float,
            PrimitiveType::Num => LocalKind::Double,
            _ => LocalKind::Int,
        }
    }

    pub fn array_type(self) -> Option<ArrayType> {
        Some(match self {
            PrimitiveType::Bool => ArrayType::Boolean,
            PrimitiveType::Char => ArrayType::Char,
            PrimitiveType::Byte => ArrayType::Byte,
            PrimitiveType::Short => ArrayType::Short,
            PrimitiveType::Int => ArrayType::Int,
            PrimitiveType::Long => ArrayType::Long,
            PrimitiveType::Float => ArrayType::Float,
            PrimitiveType::Num => ArrayType::Double,
            PrimitiveType::Void => return None,
        })
    }

    /// Binary name of the wrapper class.
    pub fn box_class(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "java.lang.Boolean",
            PrimitiveType::Char => "java.lang.Character",
            PrimitiveType::Byte => "java.lang.Byte",
            PrimitiveType::Short => "java.lang.Short",
            PrimitiveType::Int => "java.lang.Integer",
            PrimitiveType::Long => "java.lang.Long",
            PrimitiveType::Float => "java.lang.Float",
            PrimitiveType::Num => "java.lang.Double",
            PrimitiveType::Void => "java.lang.Void",
        }
    }

    pub fn unbox_method(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "booleanValue",
            PrimitiveType::Char => "charValue",
            PrimitiveType::Byte => "byteValue",
            PrimitiveType::Short => "shortValue",
            PrimitiveType::Int => "intValue",
            PrimitiveType::Long => "longValue",
            PrimitiveType::Float => "floatValue",
            PrimitiveType::Num => "doubleValue",
            PrimitiveType::Void => "",
        }
    }

    pub fn from_box(binary_name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| *p != PrimitiveType::Void && p.box_class() == binary_name)
    }
}

/// Which members structural reflection reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberView {
    /// Public members, including inherited ones.
    Public,
    /// Members the type itself declares, at every access level.
    Declared,
}

/// The static type of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveType),
    /// Raw class or interface, by dotted binary name.
    Reference(String),
    Array(Box<Type>),
    Parameterised { raw: String, args: Vec<Type> },
    /// An in-scope type parameter; rigid.
    Bounded { name: String, bound: Box<Type> },
    /// An unbound type variable from a library signature; flexible.
    Variable(String),
    Intersection(Vec<Type>),
    /// `null`, and the permissive type of anything that failed to resolve.
    Null,
    /// A value whose VM type is `erasure` but whose static type is `actual`.
    Generic { erasure: Box<Type>, actual: Box<Type> },
    /// Result of `attempt e`: the value, or the `Throwable` it raised.
    Attempted(Box<Type>),
}

impl Type {
    pub fn reference(name: impl Into<String>) -> Self {
        Type::Reference(name.into())
    }

    pub fn object() -> Self {
        Type::Reference(OBJECT.to_string())
    }

    pub fn string() -> Self {
        Type::Reference(STRING.to_string())
    }

    pub fn int() -> Self {
        Type::Primitive(PrimitiveType::Int)
    }

    pub fn boolean() -> Self {
        Type::Primitive(PrimitiveType::Bool)
    }

    pub fn void() -> Self {
        Type::Primitive(PrimitiveType::Void)
    }

    pub fn array_of(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    pub fn parameterised(raw: impl Into<String>, args: Vec<Type>) -> Self {
        Type::Parameterised {
            raw: raw.into(),
            args,
        }
    }

    /// Display name used in diagnostics.
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Underlying type of value-transparent wrappers.
    pub fn actual(&self) -> &Type {
        match self {
            Type::Generic { actual, .. } => actual.actual(),
            other => other,
        }
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self.actual() {
            Type::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.as_primitive().is_some()
    }

    pub fn is_void(&self) -> bool {
        self.as_primitive() == Some(PrimitiveType::Void)
    }

    pub fn is_reference(&self) -> bool {
        !self.is_primitive()
    }

    pub fn is_object(&self) -> bool {
        matches!(self.actual(), Type::Reference(name) if name == OBJECT)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.actual(), Type::Reference(name) if name == STRING)
    }

    /// Raw class name of class-like types.
    pub fn class_name(&self) -> Option<&str> {
        match self.actual() {
            Type::Reference(name) => Some(name),
            Type::Parameterised { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Type arguments of a parameterised type.
    pub fn type_args(&self) -> &[Type] {
        match self.actual() {
            Type::Parameterised { args, .. } => args,
            _ => &[],
        }
    }

    /// The type as the VM sees it.
    pub fn erasure(&self) -> Type {
        match self {
            Type::Primitive(_) | Type::Reference(_) => self.clone(),
            Type::Array(element) => Type::Array(Box::new(element.erasure())),
            Type::Parameterised { raw, .. } => Type::Reference(raw.clone()),
            Type::Bounded { bound, .. } => bound.erasure(),
            Type::Intersection(parts) => parts.first().map(Type::erasure).unwrap_or_else(Type::object),
            Type::Generic { erasure, .. } => erasure.erasure(),
            Type::Variable(_) | Type::Null | Type::Attempted(_) => Type::object(),
        }
    }

    pub fn descriptor(&self) -> String {
        match self.erasure() {
            Type::Primitive(p) => p.descriptor().to_string(),
            Type::Reference(name) => format!("L{};", name.replace('.', "/")),
            Type::Array(element) => format!("[{}", element.descriptor()),
            _ => "Ljava/lang/Object;".to_string(),
        }
    }

    /// Binary name of the erasure (`java.lang.String`, `Int`, `java.lang.String[]`).
    pub fn qualified_name(&self) -> String {
        match self.erasure() {
            Type::Primitive(p) => p.name().to_string(),
            Type::Reference(name) => name,
            Type::Array(element) => format!("{}[]", element.qualified_name()),
            _ => OBJECT.to_string(),
        }
    }

    /// Operand of `new`/`checkcast`/`anewarray`: an internal name, or a
    /// descriptor for arrays.
    pub fn internal_name(&self) -> String {
        match self.erasure() {
            Type::Reference(name) => name.replace('.', "/"),
            other => other.descriptor(),
        }
    }

    /// Generic signature (JVMS §4.7.9.1) of this type.
    pub fn signature(&self) -> String {
        match self {
            Type::Primitive(p) => p.descriptor().to_string(),
            Type::Reference(_) | Type::Null | Type::Attempted(_) => self.descriptor(),
            Type::Array(element) => format!("[{}", element.signature()),
            Type::Parameterised { raw, args } => {
                let args: String = args.iter().map(Type::signature).collect();
                format!("L{}<{}>;", raw.replace('.', "/"), args)
            }
            Type::Bounded { name, .. } => format!("T{name};"),
            Type::Variable(name) if name == "?" => "*".to_string(),
            Type::Variable(name) => format!("T{name};"),
            Type::Intersection(parts) => parts
                .first()
                .map(Type::signature)
                .unwrap_or_else(|| self.descriptor()),
            Type::Generic { actual, .. } => actual.signature(),
        }
    }

    /// The signature carries information the descriptor does not.
    pub fn is_generic(&self) -> bool {
        match self {
            Type::Parameterised { .. } | Type::Bounded { .. } | Type::Variable(_) => true,
            Type::Array(element) => element.is_generic(),
            _ => false,
        }
    }

    /// Operand-stack / local-slot width.
    pub fn width(&self) -> u16 {
        match self.erasure() {
            Type::Primitive(p) => p.width(),
            _ => 1,
        }
    }

    pub fn local_kind(&self) -> LocalKind {
        match self.erasure() {
            Type::Primitive(p) => p.local_kind(),
            _ => LocalKind::Reference,
        }
    }

    /// Replace type variables bound in `bindings`.
    pub fn substitute(&self, bindings: &HashMap<String, Type>) -> Type {
        if bindings.is_empty() {
            return self.clone();
        }
        match self {
            Type::Variable(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::Array(element) => Type::Array(Box::new(element.substitute(bindings))),
            Type::Parameterised { raw, args } => Type::Parameterised {
                raw: raw.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            Type::Intersection(parts) => {
                Type::Intersection(parts.iter().map(|p| p.substitute(bindings)).collect())
            }
            Type::Generic { erasure, actual } => Type::Generic {
                erasure: erasure.clone(),
                actual: Box::new(actual.substitute(bindings)),
            },
            Type::Attempted(inner) => Type::Attempted(Box::new(inner.substitute(bindings))),
            Type::Primitive(_) | Type::Reference(_) | Type::Bounded { .. } | Type::Null => {
                self.clone()
            }
        }
    }

    /// Whether a type variable named `name` occurs anywhere in this type.
    pub fn mentions_variable(&self, name: &str) -> bool {
        match self {
            Type::Variable(v) => v == name,
            Type::Array(element) => element.mentions_variable(name),
            Type::Parameterised { args, .. } => args.iter().any(|a| a.mentions_variable(name)),
            Type::Intersection(parts) => parts.iter().any(|p| p.mentions_variable(name)),
            Type::Generic { actual, .. } => actual.mentions_variable(name),
            Type::Attempted(inner) => inner.mentions_variable(name),
            _ => false,
        }
    }
}

impl From<PrimitiveType> for Type {
    fn from(p: PrimitiveType) -> Self {
        Type::Primitive(p)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => f.write_str(p.name()),
            Type::Reference(name) => f.write_str(name),
            Type::Array(element) => write!(f, "{element}[]"),
            Type::Parameterised { raw, args } => {
                write!(f, "{raw}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            Type::Bounded { name, .. } | Type::Variable(name) => f.write_str(name),
            Type::Intersection(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" & ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Type::Null => f.write_str("null"),
            Type::Generic { actual, .. } => write!(f, "{actual}"),
            Type::Attempted(inner) => write!(f, "attempt {inner}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn descriptors_and_signatures() {
        let list = Type::parameterised(LIST, vec![Type::string()]);
        assert_eq!(list.descriptor(), "Ljava/util/List;");
        assert_eq!(list.signature(), "Ljava/util/List<Ljava/lang/String;>;");
        assert_eq!(list.name(), "java.util.List<java.lang.String>");

        let t = Type::Bounded {
            name: "T".into(),
            bound: Box::new(Type::reference("java.lang.Comparable")),
        };
        assert_eq!(t.descriptor(), "Ljava/lang/Comparable;");
        assert_eq!(t.signature(), "TT;");
        assert!(Type::array_of(t).is_generic());

        let grid = Type::array_of(Type::array_of(Type::Primitive(PrimitiveType::Num)));
        assert_eq!(grid.descriptor(), "[[D");
        assert_eq!(grid.internal_name(), "[[D");
        assert_eq!(grid.qualified_name(), "Num[][]");
    }

    #[test]
    fn widths() {
        assert_eq!(Type::void().width(), 0);
        assert_eq!(Type::Primitive(PrimitiveType::Long).width(), 2);
        assert_eq!(Type::Primitive(PrimitiveType::Num).width(), 2);
        assert_eq!(Type::Primitive(PrimitiveType::Bool).width(), 1);
        assert_eq!(Type::string().width(), 1);
        let generic = Type::Generic {
            erasure: Box::new(Type::object()),
            actual: Box::new(Type::reference("java.lang.Long")),
        };
        assert_eq!(generic.width(), 1);
    }

    #[test]
    fn widening_table() {
        use PrimitiveType::*;
        assert!(Int.widens_to(Long));
        assert!(Int.widens_to(Float));
        assert!(Long.widens_to(Num));
        assert!(Float.widens_to(Num));
        assert!(Byte.widens_to(Short));
        assert!(Char.widens_to(Int));
        assert!(!Long.widens_to(Float));
        assert!(!Float.widens_to(Long));
        assert!(!Long.widens_to(Int));
        assert!(!Num.widens_to(Float));
        assert!(!Char.widens_to(Short));
        assert!(!Bool.widens_to(Int));
        assert!(!Bool.widens_to(Char));
        assert!(Bool.widens_to(Long));
        assert!(Bool.widens_to(Num));
        assert!(!Long.widens_to(Bool));
        assert!(!Int.widens_to(Void));
    }

    #[test]
    fn substitution_reaches_nested_arguments() {
        let bindings: HashMap<String, Type> = [("E".to_string(), Type::string())].into();
        let ty = Type::parameterised(LIST, vec![Type::array_of(Type::Variable("E".into()))]);
        assert_eq!(
            ty.substitute(&bindings),
            Type::parameterised(LIST, vec![Type::array_of(Type::string())])
        );
        assert!(ty.mentions_variable("E"));
        assert!(!ty.mentions_variable("K"));
    }
}
