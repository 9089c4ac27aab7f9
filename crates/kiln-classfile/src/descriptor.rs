use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'B' => BaseType::Byte,
            'C' => BaseType::Char,
            'D' => BaseType::Double,
            'F' => BaseType::Float,
            'I' => BaseType::Int,
            'J' => BaseType::Long,
            'S' => BaseType::Short,
            'Z' => BaseType::Boolean,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }

    /// Local-variable / operand-stack slots occupied by a value of this type.
    pub fn slots(self) -> u16 {
        match self {
            BaseType::Long | BaseType::Double => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Base(BaseType),
    /// Internal (slash separated) class name.
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn slots(&self) -> u16 {
        match self {
            FieldType::Base(base) => base.slots(),
            FieldType::Object(_) | FieldType::Array(_) => 1,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Base(base) => write!(f, "{}", base.as_char()),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(component) => write!(f, "[{component}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnType {
    Void,
    Type(FieldType),
}

impl ReturnType {
    pub fn slots(&self) -> u16 {
        match self {
            ReturnType::Void => 0,
            ReturnType::Type(ty) => ty.slots(),
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Void => f.write_str("V"),
            ReturnType::Type(ty) => write!(f, "{ty}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub return_type: ReturnType,
}

impl MethodDescriptor {
    /// Slots taken by the arguments, not counting the receiver.
    pub fn param_slots(&self) -> u16 {
        self.params.iter().map(FieldType::slots).sum()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            write!(f, "{param}")?;
        }
        write!(f, "){}", self.return_type)
    }
}

pub fn parse_field_descriptor(desc: &str) -> Result<FieldType> {
    let (ty, rest) = parse_field_type(desc).ok_or_else(|| invalid(desc))?;
    if !rest.is_empty() {
        return Err(invalid(desc));
    }
    Ok(ty)
}

pub fn parse_method_descriptor(desc: &str) -> Result<MethodDescriptor> {
    let mut rest = desc.strip_prefix('(').ok_or_else(|| invalid(desc))?;

    let mut params = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        let (param, after) = parse_field_type(rest).ok_or_else(|| invalid(desc))?;
        params.push(param);
        rest = after;
    }

    let return_type = if rest == "V" {
        ReturnType::Void
    } else {
        ReturnType::Type(parse_field_descriptor(rest).map_err(|_| invalid(desc))?)
    };

    Ok(MethodDescriptor {
        params,
        return_type,
    })
}

fn parse_field_type(input: &str) -> Option<(FieldType, &str)> {
    let first = input.chars().next()?;
    if let Some(base) = BaseType::from_char(first) {
        return Some((FieldType::Base(base), &input[1..]));
    }
    match first {
        'L' => {
            let end = input.find(';')?;
            let name = &input[1..end];
            if name.is_empty() {
                return None;
            }
            Some((FieldType::Object(name.to_string()), &input[end + 1..]))
        }
        '[' => {
            let (component, rest) = parse_field_type(&input[1..])?;
            Some((FieldType::Array(Box::new(component)), rest))
        }
        _ => None,
    }
}

fn invalid(desc: &str) -> Error {
    Error::InvalidDescriptor(desc.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_descriptor_primitives_and_arrays() {
        assert_eq!(parse_field_descriptor("J").unwrap(), FieldType::Base(BaseType::Long));
        assert_eq!(
            parse_field_descriptor("[[Ljava/util/List;").unwrap(),
            FieldType::Array(Box::new(FieldType::Array(Box::new(FieldType::Object(
                "java/util/List".to_string()
            )))))
        );
        assert!(parse_field_descriptor("L;").is_err());
        assert!(parse_field_descriptor("II").is_err());
    }

    #[test]
    fn method_descriptor_renders_back() {
        for text in ["()V", "(IJLjava/lang/String;)[D", "([Ljava/lang/Object;)Ljava/util/List;"] {
            let desc = parse_method_descriptor(text).unwrap();
            assert_eq!(desc.to_string(), text);
        }
    }

    #[test]
    fn param_slots_counts_wide_values() {
        let desc = parse_method_descriptor("(JDILjava/lang/Object;)V").unwrap();
        assert_eq!(desc.param_slots(), 6);
        assert_eq!(desc.return_type.slots(), 0);
    }

    #[test]
    fn rejects_missing_return() {
        assert!(parse_method_descriptor("(I)").is_err());
        assert!(parse_method_descriptor("I)V").is_err());
    }
}
