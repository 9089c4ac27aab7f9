use std::collections::HashMap;
use std::sync::Arc;

use kiln_classfile::{ACC_PUBLIC, ACC_STATIC};

use crate::callable::Callable;
use crate::ty::Type;

/// Read access to class metadata. Every structural query goes through this.
pub trait TypeEnv {
    /// Look up a class by dotted binary name.
    fn class(&self, name: &str) -> Option<Arc<ClassDef>>;
}

impl<E: TypeEnv + ?Sized> TypeEnv for &E {
    fn class(&self, name: &str) -> Option<Arc<ClassDef>> {
        (**self).class(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Interface,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParamDef {
    pub name: String,
    /// Empty means `java.lang.Object`.
    pub bounds: Vec<Type>,
}

impl TypeParamDef {
    fn bound(&self) -> Type {
        match self.bounds.as_slice() {
            [] => Type::object(),
            [single] => single.clone(),
            many => Type::Intersection(many.to_vec()),
        }
    }

    /// The parameters as seen from inside their declaration: rigid
    /// `Bounded` types whose bounds refer to each other rigidly, so
    /// `T extends Comparable<T>` stays tied to `T`.
    pub fn rigid(params: &[TypeParamDef]) -> HashMap<String, Type> {
        let shallow: HashMap<String, Type> = params
            .iter()
            .map(|p| {
                let ty = Type::Bounded {
                    name: p.name.clone(),
                    bound: Box::new(p.bound().erasure()),
                };
                (p.name.clone(), ty)
            })
            .collect();
        params
            .iter()
            .map(|p| {
                let ty = Type::Bounded {
                    name: p.name.clone(),
                    bound: Box::new(p.bound().substitute(&shallow)),
                };
                (p.name.clone(), ty)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub owner: String,
    pub name: String,
    /// Erased type, from the descriptor.
    pub ty: Type,
    /// Declared type, from the signature (or `ty`).
    pub generic_ty: Type,
    pub access_flags: u16,
}

impl FieldDef {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_public(&self) -> bool {
        self.access_flags & ACC_PUBLIC != 0
    }

    /// The field's type when read through `receiver`.
    pub fn type_through(&self, receiver: &Type, env: &dyn TypeEnv) -> Type {
        let bindings = owner_bindings(receiver, &self.owner, env);
        let actual = self.generic_ty.substitute(&bindings);
        wrap_generic(&self.ty, actual)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    /// Dotted binary name.
    pub name: String,
    pub kind: ClassKind,
    pub access_flags: u16,
    pub type_params: Vec<TypeParamDef>,
    pub super_class: Option<Type>,
    pub interfaces: Vec<Type>,
    pub fields: Vec<FieldDef>,
    pub constructors: Vec<Callable>,
    pub methods: Vec<Callable>,
}

impl ClassDef {
    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    /// Direct supertypes: the super class, then interfaces.
    pub fn supertypes(&self) -> impl Iterator<Item = &Type> {
        self.super_class.iter().chain(self.interfaces.iter())
    }

    /// The class as seen from its own body: type parameters become rigid.
    pub fn this_type(&self) -> Type {
        if self.type_params.is_empty() {
            return Type::Reference(self.name.clone());
        }
        let rigid = TypeParamDef::rigid(&self.type_params);
        Type::Parameterised {
            raw: self.name.clone(),
            args: self
                .type_params
                .iter()
                .filter_map(|p| rigid.get(&p.name).cloned())
                .collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Bindings of `owner`'s type parameters when `receiver` is viewed as `owner`.
/// Raw or unrelated receivers bind nothing.
pub fn owner_bindings(receiver: &Type, owner: &str, env: &dyn TypeEnv) -> HashMap<String, Type> {
    let Some(view) = crate::assign::view_as(receiver, owner, env) else {
        return HashMap::new();
    };
    let args = view.type_args();
    if args.is_empty() {
        return HashMap::new();
    }
    let Some(def) = env.class(owner) else {
        return HashMap::new();
    };
    if def.type_params.len() != args.len() {
        return HashMap::new();
    }
    def.type_params
        .iter()
        .map(|p| p.name.clone())
        .zip(args.iter().cloned())
        .collect()
}

/// `actual` if it adds nothing over `erased`, else a `Generic` wrapper.
pub(crate) fn wrap_generic(erased: &Type, actual: Type) -> Type {
    if &actual == erased {
        actual
    } else {
        Type::Generic {
            erasure: Box::new(erased.clone()),
            actual: Box::new(actual),
        }
    }
}
