//! Source type names to catalog types.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kiln_core::Diagnostic;
use kiln_syntax::ast::{Import, TypeRef};
use kiln_types::{PrimitiveType, Type, TypeEnv};

use crate::codes;

/// What a type name can refer to in one file: its imports, the classes
/// compiled alongside it, `java.lang`, and the type parameters in scope.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    imports: Vec<Import>,
    batch: Arc<HashSet<String>>,
    type_params: HashMap<String, Type>,
}

impl Scope {
    pub fn new(imports: &[Import], batch: Arc<HashSet<String>>) -> Self {
        Self {
            imports: imports.to_vec(),
            batch,
            type_params: HashMap::new(),
        }
    }

    /// The same scope with `params` (rigid `Bounded` types) visible.
    #[must_use]
    pub fn with_type_params(&self, params: HashMap<String, Type>) -> Self {
        Self {
            type_params: params,
            ..self.clone()
        }
    }

    fn known(&self, name: &str, env: &dyn TypeEnv) -> bool {
        self.batch.contains(name) || env.class(name).is_some()
    }

    /// Binary name a class name refers to.
    pub fn class_name(&self, name: &str, env: &dyn TypeEnv) -> Option<String> {
        if name.contains('.') {
            return self.known(name, env).then(|| name.to_string());
        }
        if let Some(import) = self.imports.iter().find(|i| i.simple_name() == Some(name)) {
            return self.known(&import.path, env).then(|| import.path.clone());
        }
        if self.known(name, env) {
            return Some(name.to_string());
        }
        self.imports
            .iter()
            .filter(|i| i.is_star)
            .map(|i| format!("{}.{}", i.path, name))
            .chain(std::iter::once(format!("java.lang.{name}")))
            .find(|candidate| self.known(candidate, env))
    }

    pub fn resolve(&self, ty: &TypeRef, env: &dyn TypeEnv) -> Result<Type, Diagnostic> {
        let base = if let Some(param) = self.type_params.get(&ty.name) {
            if !ty.args.is_empty() {
                return Err(type_error(ty, format!("Type parameter '{}' cannot have type arguments", ty.name)));
            }
            param.clone()
        } else if let Some(primitive) = PrimitiveType::from_name(&ty.name) {
            if !ty.args.is_empty() {
                return Err(type_error(ty, format!("Primitive type '{}' cannot have type arguments", ty.name)));
            }
            if primitive == PrimitiveType::Void && ty.dims > 0 {
                return Err(type_error(ty, "Void cannot be an array element type"));
            }
            Type::Primitive(primitive)
        } else {
            let Some(name) = self.class_name(&ty.name, env) else {
                return Err(Diagnostic::error(
                    codes::UNKNOWN_TYPE,
                    ty.at,
                    format!("Unknown type '{}'", ty.name),
                ));
            };
            if ty.args.is_empty() {
                Type::Reference(name)
            } else {
                let args = ty
                    .args
                    .iter()
                    .map(|arg| self.resolve(arg, env).map(boxed))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(def) = env.class(&name) {
                    if def.type_params.len() != args.len() {
                        return Err(type_error(
                            ty,
                            format!(
                                "Type '{}' expects {} type arguments, found {}",
                                name,
                                def.type_params.len(),
                                args.len()
                            ),
                        ));
                    }
                }
                Type::Parameterised { raw: name, args }
            }
        };
        Ok((0..ty.dims).fold(base, |element, _| Type::array_of(element)))
    }

    /// Resolve, reporting a failure into `diagnostics` and yielding `Null`.
    pub fn resolve_or_null(&self, ty: &TypeRef, env: &dyn TypeEnv, diagnostics: &mut Vec<Diagnostic>) -> Type {
        self.resolve(ty, env).unwrap_or_else(|diagnostic| {
            diagnostics.push(diagnostic);
            Type::Null
        })
    }
}

/// Type arguments are references; `List<Int>` means `List<Integer>`.
fn boxed(ty: Type) -> Type {
    match ty {
        Type::Primitive(p) if p != PrimitiveType::Void => Type::reference(p.box_class()),
        other => other,
    }
}

fn type_error(ty: &TypeRef, message: impl Into<String>) -> Diagnostic {
    Diagnostic::error(codes::TYPE, ty.at, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::Coordinate;
    use kiln_types::{BuiltinJdk, Classes, LIST};
    use pretty_assertions::assert_eq;

    fn type_ref(name: &str, args: Vec<TypeRef>, dims: u32) -> TypeRef {
        TypeRef {
            name: name.to_string(),
            args,
            dims,
            at: Coordinate::new(1, 0),
        }
    }

    fn import(path: &str, is_star: bool) -> Import {
        Import {
            path: path.to_string(),
            is_star,
            at: Coordinate::new(1, 0),
        }
    }

    #[test]
    fn names_resolve_through_imports_batch_and_java_lang() {
        let env = Classes::new(Arc::new(BuiltinJdk::new()));
        let batch: Arc<HashSet<String>> = Arc::new(["Shape".to_string()].into());
        let scope = Scope::new(&[import("java.util", true)], batch);

        assert_eq!(scope.class_name("String", &env).as_deref(), Some("java.lang.String"));
        assert_eq!(scope.class_name("ArrayList", &env).as_deref(), Some("java.util.ArrayList"));
        assert_eq!(scope.class_name("Shape", &env).as_deref(), Some("Shape"));
        assert_eq!(scope.class_name("Nope", &env), None);
    }

    #[test]
    fn generic_arguments_are_boxed_and_counted() {
        let env = Classes::new(Arc::new(BuiltinJdk::new()));
        let scope = Scope::new(&[import("java.util.List", false)], Arc::default());

        let list = scope
            .resolve(&type_ref("List", vec![type_ref("Int", vec![], 0)], 1), &env)
            .unwrap();
        assert_eq!(
            list,
            Type::array_of(Type::parameterised(LIST, vec![Type::reference("java.lang.Integer")]))
        );

        let err = scope
            .resolve(&type_ref("List", vec![type_ref("Int", vec![], 0), type_ref("Int", vec![], 0)], 0), &env)
            .unwrap_err();
        assert_eq!(err.code, codes::TYPE);
    }

    #[test]
    fn unknown_names_report_once() {
        let env = Classes::new(Arc::new(BuiltinJdk::new()));
        let scope = Scope::default();
        let mut diagnostics = Vec::new();
        let ty = scope.resolve_or_null(&type_ref("Missing", vec![], 0), &env, &mut diagnostics);
        assert_eq!(ty, Type::Null);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].to_string(), "line 1:0 Unknown type 'Missing'.");
    }
}
