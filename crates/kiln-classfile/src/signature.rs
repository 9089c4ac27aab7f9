//! Generic signatures (JVMS §4.7.9.1).

use crate::descriptor::BaseType;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub super_class: ClassTypeSignature,
    pub interfaces: Vec<ClassTypeSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<TypeSignature>,
    /// `None` for `V`.
    pub return_type: Option<TypeSignature>,
    pub throws: Vec<TypeSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,
    pub class_bound: Option<TypeSignature>,
    pub interface_bounds: Vec<TypeSignature>,
}

impl TypeParameter {
    /// Class bound followed by interface bounds.
    pub fn bounds(&self) -> impl Iterator<Item = &TypeSignature> {
        self.class_bound.iter().chain(self.interface_bounds.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleClassTypeSignature {
    pub name: String,
    pub type_arguments: Vec<TypeArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTypeSignature {
    /// Package prefix in internal form, including the trailing `/` (may be empty).
    pub package: String,
    /// Outer-to-inner class segments.
    pub segments: Vec<SimpleClassTypeSignature>,
}

impl ClassTypeSignature {
    pub fn internal_name(&self) -> String {
        let mut out = self.package.clone();
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('$');
            }
            out.push_str(&seg.name);
        }
        out
    }

    /// Type arguments of the innermost segment.
    pub fn type_arguments(&self) -> &[TypeArgument] {
        self.segments
            .last()
            .map(|seg| seg.type_arguments.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArgument {
    /// `*`
    Any,
    Extends(TypeSignature),
    Super(TypeSignature),
    Exact(TypeSignature),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSignature {
    Base(BaseType),
    Class(ClassTypeSignature),
    TypeVariable(String),
    Array(Box<TypeSignature>),
}

pub type FieldTypeSignature = TypeSignature;

pub fn parse_class_signature(sig: &str) -> Result<ClassSignature> {
    let mut p = Parser::new(sig);
    let type_parameters = p.type_parameters()?;
    let super_class = p.class_type()?;
    let mut interfaces = Vec::new();
    while !p.at_end() {
        interfaces.push(p.class_type()?);
    }
    Ok(ClassSignature {
        type_parameters,
        super_class,
        interfaces,
    })
}

pub fn parse_method_signature(sig: &str) -> Result<MethodSignature> {
    let mut p = Parser::new(sig);
    let type_parameters = p.type_parameters()?;
    p.expect('(')?;
    let mut parameters = Vec::new();
    while !p.eat(')') {
        parameters.push(p.java_type()?);
    }
    let return_type = if p.eat('V') {
        None
    } else {
        Some(p.java_type()?)
    };
    let mut throws = Vec::new();
    while p.eat('^') {
        throws.push(p.reference_type()?);
    }
    p.finish()?;
    Ok(MethodSignature {
        type_parameters,
        parameters,
        return_type,
        throws,
    })
}

pub fn parse_field_signature(sig: &str) -> Result<FieldTypeSignature> {
    let mut p = Parser::new(sig);
    let ty = p.reference_type()?;
    p.finish()?;
    Ok(ty)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self) -> Error {
        Error::InvalidSignature(self.input.to_string())
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn finish(&self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn identifier(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '.' | ';' | '[' | '/' | '<' | '>' | ':') {
                break;
            }
            self.pos += c.len_utf8();
        }
        if self.pos == start {
            return Err(self.error());
        }
        Ok(&self.input[start..self.pos])
    }

    fn type_parameters(&mut self) -> Result<Vec<TypeParameter>> {
        let mut params = Vec::new();
        if !self.eat('<') {
            return Ok(params);
        }
        while !self.eat('>') {
            let name = self.identifier()?.to_string();
            self.expect(':')?;
            // The class bound may be empty (`T::Ljava/lang/Comparable;`).
            let class_bound = match self.peek() {
                Some('L' | 'T' | '[') => Some(self.reference_type()?),
                _ => None,
            };
            let mut interface_bounds = Vec::new();
            while self.eat(':') {
                interface_bounds.push(self.reference_type()?);
            }
            params.push(TypeParameter {
                name,
                class_bound,
                interface_bounds,
            });
        }
        if params.is_empty() {
            return Err(self.error());
        }
        Ok(params)
    }

    fn java_type(&mut self) -> Result<TypeSignature> {
        if let Some(base) = self.peek().and_then(BaseType::from_char) {
            self.bump();
            return Ok(TypeSignature::Base(base));
        }
        self.reference_type()
    }

    fn reference_type(&mut self) -> Result<TypeSignature> {
        match self.peek() {
            Some('L') => Ok(TypeSignature::Class(self.class_type()?)),
            Some('T') => {
                self.bump();
                let name = self.identifier()?.to_string();
                self.expect(';')?;
                Ok(TypeSignature::TypeVariable(name))
            }
            Some('[') => {
                self.bump();
                Ok(TypeSignature::Array(Box::new(self.java_type()?)))
            }
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self) -> Result<ClassTypeSignature> {
        self.expect('L')?;
        let mut package = String::new();
        let mut name = self.identifier()?;
        while self.eat('/') {
            package.push_str(name);
            package.push('/');
            name = self.identifier()?;
        }

        let mut segments = vec![SimpleClassTypeSignature {
            name: name.to_string(),
            type_arguments: self.type_arguments()?,
        }];
        while self.eat('.') {
            let name = self.identifier()?.to_string();
            segments.push(SimpleClassTypeSignature {
                name,
                type_arguments: self.type_arguments()?,
            });
        }
        self.expect(';')?;
        Ok(ClassTypeSignature { package, segments })
    }

    fn type_arguments(&mut self) -> Result<Vec<TypeArgument>> {
        let mut args = Vec::new();
        if !self.eat('<') {
            return Ok(args);
        }
        while !self.eat('>') {
            let arg = match self.peek() {
                Some('*') => {
                    self.bump();
                    TypeArgument::Any
                }
                Some('+') => {
                    self.bump();
                    TypeArgument::Extends(self.reference_type()?)
                }
                Some('-') => {
                    self.bump();
                    TypeArgument::Super(self.reference_type()?)
                }
                Some(_) => TypeArgument::Exact(self.reference_type()?),
                None => return Err(self.error()),
            };
            args.push(arg);
        }
        if args.is_empty() {
            return Err(self.error());
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(internal: &str, args: Vec<TypeArgument>) -> TypeSignature {
        let (package, name) = match internal.rfind('/') {
            Some(i) => (internal[..=i].to_string(), internal[i + 1..].to_string()),
            None => (String::new(), internal.to_string()),
        };
        TypeSignature::Class(ClassTypeSignature {
            package,
            segments: vec![SimpleClassTypeSignature {
                name,
                type_arguments: args,
            }],
        })
    }

    #[test]
    fn class_signature_with_interface_only_bound() {
        let sig = parse_class_signature(
            "<T::Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;Ljava/lang/Iterable<TT;>;",
        )
        .unwrap();
        assert_eq!(sig.type_parameters.len(), 1);
        let param = &sig.type_parameters[0];
        assert_eq!(param.name, "T");
        assert_eq!(param.class_bound, None);
        assert_eq!(
            param.interface_bounds,
            vec![class(
                "java/lang/Comparable",
                vec![TypeArgument::Exact(TypeSignature::TypeVariable("T".into()))]
            )]
        );
        assert_eq!(sig.super_class.internal_name(), "java/lang/Object");
        assert_eq!(sig.interfaces[0].internal_name(), "java/lang/Iterable");
    }

    #[test]
    fn method_signature_with_wildcards_and_throws() {
        let sig = parse_method_signature(
            "<K:Ljava/lang/Object;>(Ljava/util/Map<TK;+Ljava/lang/Number;>;[I)TK;^Ljava/io/IOException;",
        )
        .unwrap();
        assert_eq!(sig.type_parameters[0].name, "K");
        assert_eq!(sig.parameters.len(), 2);
        let TypeSignature::Class(map) = &sig.parameters[0] else {
            panic!("expected class type");
        };
        assert_eq!(
            map.type_arguments()[1],
            TypeArgument::Extends(class("java/lang/Number", vec![]))
        );
        assert_eq!(sig.return_type, Some(TypeSignature::TypeVariable("K".into())));
        assert_eq!(sig.throws.len(), 1);
    }

    #[test]
    fn inner_class_segments_join_with_dollar() {
        let sig = parse_field_signature("Ljava/util/Map$Entry<TK;TV;>;").unwrap();
        let TypeSignature::Class(cls) = sig else {
            panic!("expected class type");
        };
        assert_eq!(cls.internal_name(), "java/util/Map$Entry");

        let sig = parse_field_signature("Lp/Outer<TT;>.Inner<Ljava/lang/String;>;").unwrap();
        let TypeSignature::Class(cls) = sig else {
            panic!("expected class type");
        };
        assert_eq!(cls.internal_name(), "p/Outer$Inner");
        assert_eq!(cls.type_arguments().len(), 1);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_field_signature("I").is_err());
        assert!(parse_method_signature("(I").is_err());
        assert!(parse_class_signature("<>Ljava/lang/Object;").is_err());
    }
}
