use kiln_classfile::{InvokeKind, ACC_PUBLIC};

use crate::class::{owner_bindings, wrap_generic, TypeEnv, TypeParamDef};
use crate::ty::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableKind {
    Constructor,
    Method,
}

/// A constructor or method, as the catalog describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callable {
    /// Dotted binary name of the declaring class.
    pub owner: String,
    pub name: String,
    pub kind: CallableKind,
    /// Erased parameter types, from the descriptor.
    pub params: Vec<Type>,
    /// Declared parameter types, from the signature (or `params`).
    pub generic_params: Vec<Type>,
    pub return_type: Type,
    pub generic_return: Type,
    /// Method-level type parameters.
    pub type_params: Vec<TypeParamDef>,
    pub is_varargs: bool,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_interface_owner: bool,
    pub access_flags: u16,
}

impl Callable {
    pub fn is_constructor(&self) -> bool {
        self.kind == CallableKind::Constructor
    }

    pub fn is_public(&self) -> bool {
        self.access_flags & ACC_PUBLIC != 0
    }

    pub fn descriptor(&self) -> String {
        let params: String = self.params.iter().map(Type::descriptor).collect();
        format!("({}){}", params, self.return_type.descriptor())
    }

    /// Generic signature, or `None` when the descriptor says everything.
    pub fn signature(&self) -> Option<String> {
        let generic = !self.type_params.is_empty()
            || self.generic_params.iter().any(Type::is_generic)
            || self.generic_return.is_generic();
        if !generic {
            return None;
        }

        let mut out = String::new();
        if !self.type_params.is_empty() {
            out.push('<');
            for param in &self.type_params {
                out.push_str(&param.name);
                if param.bounds.is_empty() {
                    out.push_str(":Ljava/lang/Object;");
                }
                for bound in &param.bounds {
                    out.push(':');
                    out.push_str(&bound.signature());
                }
            }
            out.push('>');
        }
        out.push('(');
        for param in &self.generic_params {
            out.push_str(&param.signature());
        }
        out.push(')');
        out.push_str(&self.generic_return.signature());
        Some(out)
    }

    /// `name(A, B)` for diagnostics.
    pub fn display(&self) -> String {
        let params: Vec<String> = self.generic_params.iter().map(Type::name).collect();
        let name = if self.is_constructor() {
            self.owner.rsplit('.').next().unwrap_or(&self.owner)
        } else {
            &self.name
        };
        format!("{}({})", name, params.join(", "))
    }

    /// The VM name: `<init>` for constructors.
    pub fn vm_name(&self) -> &str {
        if self.is_constructor() {
            "<init>"
        } else {
            &self.name
        }
    }

    pub fn invoke_kind(&self) -> InvokeKind {
        if self.is_constructor() {
            InvokeKind::Special
        } else if self.is_static {
            InvokeKind::Static
        } else if self.is_interface_owner {
            InvokeKind::Interface
        } else {
            InvokeKind::Virtual
        }
    }

    /// Whether `name` is one of the owner's (not the method's) type variables.
    pub fn is_class_variable(&self, name: &str) -> bool {
        !self.type_params.iter().any(|p| p.name == name)
    }

    /// Substitute the receiver's type arguments into the declared parameter
    /// and return types.
    pub fn with_owner(&self, receiver: &Type, env: &dyn TypeEnv) -> Callable {
        let bindings = owner_bindings(receiver, &self.owner, env);
        if bindings.is_empty() {
            return self.clone();
        }
        let mut bound = self.clone();
        bound.generic_params = self
            .generic_params
            .iter()
            .map(|p| p.substitute(&bindings))
            .collect();
        bound.generic_return = self.generic_return.substitute(&bindings);
        bound
    }

    /// Type of a call's value: a substituted return becomes a `Generic` so
    /// its VM type stays the erased one.
    pub fn result_type(&self) -> Type {
        wrap_generic(&self.return_type, self.generic_return.clone())
    }
}
