//! Conversion from parsed class-file stubs into catalog [`ClassDef`]s.

use kiln_classfile::{
    BaseType, ClassStub, ClassTypeSignature, FieldStub, FieldType, MethodStub, ReturnType,
    TypeArgument, TypeParameter, TypeSignature, ACC_ABSTRACT, ACC_STATIC, ACC_VARARGS,
};

use crate::callable::{Callable, CallableKind};
use crate::class::{ClassDef, ClassKind, FieldDef, TypeParamDef};
use crate::ty::{PrimitiveType, Type};

fn binary_name(internal: &str) -> String {
    internal.replace('/', ".")
}

fn base_type(base: BaseType) -> PrimitiveType {
    match base {
        BaseType::Byte => PrimitiveType::Byte,
        BaseType::Char => PrimitiveType::Char,
        BaseType::Double => PrimitiveType::Num,
        BaseType::Float => PrimitiveType::Float,
        BaseType::Int => PrimitiveType::Int,
        BaseType::Long => PrimitiveType::Long,
        BaseType::Short => PrimitiveType::Short,
        BaseType::Boolean => PrimitiveType::Bool,
    }
}

pub fn field_type(ty: &FieldType) -> Type {
    match ty {
        FieldType::Base(base) => Type::Primitive(base_type(*base)),
        FieldType::Object(internal) => Type::Reference(binary_name(internal)),
        FieldType::Array(component) => Type::array_of(field_type(component)),
    }
}

pub fn return_type(ty: &ReturnType) -> Type {
    match ty {
        ReturnType::Void => Type::void(),
        ReturnType::Type(ty) => field_type(ty),
    }
}

/// Class type variables stay flexible `Variable`s; wildcards become the
/// anonymous variable `?`, which matches any argument.
pub fn signature_type(sig: &TypeSignature) -> Type {
    match sig {
        TypeSignature::Base(base) => Type::Primitive(base_type(*base)),
        TypeSignature::Class(class) => class_type(class),
        TypeSignature::TypeVariable(name) => Type::Variable(name.clone()),
        TypeSignature::Array(component) => Type::array_of(signature_type(component)),
    }
}

fn class_type(class: &ClassTypeSignature) -> Type {
    let raw = binary_name(&class.internal_name());
    let args: Vec<Type> = class
        .type_arguments()
        .iter()
        .map(|arg| match arg {
            TypeArgument::Any | TypeArgument::Extends(_) | TypeArgument::Super(_) => {
                Type::Variable("?".to_string())
            }
            TypeArgument::Exact(ty) => signature_type(ty),
        })
        .collect();
    if args.is_empty() {
        Type::Reference(raw)
    } else {
        Type::Parameterised { raw, args }
    }
}

fn type_params(params: &[TypeParameter]) -> Vec<TypeParamDef> {
    params
        .iter()
        .map(|p| TypeParamDef {
            name: p.name.clone(),
            bounds: p
                .bounds()
                .map(signature_type)
                .filter(|bound| !bound.is_object())
                .collect(),
        })
        .collect()
}

pub fn class_def(stub: &ClassStub) -> ClassDef {
    let name = binary_name(&stub.internal_name);
    let kind = if stub.is_interface() {
        ClassKind::Interface
    } else {
        ClassKind::Class
    };

    let (type_params, super_class, interfaces) = match &stub.signature {
        Some(sig) if sig.interfaces.len() == stub.interfaces.len() => (
            type_params(&sig.type_parameters),
            stub.super_class.as_ref().map(|_| class_type(&sig.super_class)),
            sig.interfaces.iter().map(class_type).collect(),
        ),
        _ => (
            Vec::new(),
            stub.super_class.as_deref().map(|s| Type::Reference(binary_name(s))),
            stub.interfaces
                .iter()
                .map(|i| Type::Reference(binary_name(i)))
                .collect(),
        ),
    };

    let fields = stub.fields.iter().map(|f| field_def(&name, f)).collect();

    let mut constructors = Vec::new();
    let mut methods = Vec::new();
    for method in &stub.methods {
        match method.name.as_str() {
            "<clinit>" => {}
            "<init>" => constructors.push(callable(&name, kind, method, CallableKind::Constructor)),
            _ => methods.push(callable(&name, kind, method, CallableKind::Method)),
        }
    }

    ClassDef {
        name,
        kind,
        access_flags: stub.access_flags,
        type_params,
        super_class,
        interfaces,
        fields,
        constructors,
        methods,
    }
}

fn field_def(owner: &str, field: &FieldStub) -> FieldDef {
    let ty = field_type(&field.parsed_descriptor);
    let generic_ty = field
        .signature
        .as_ref()
        .map(signature_type)
        .unwrap_or_else(|| ty.clone());
    FieldDef {
        owner: owner.to_string(),
        name: field.name.clone(),
        ty,
        generic_ty,
        access_flags: field.access_flags,
    }
}

fn callable(owner: &str, owner_kind: ClassKind, method: &MethodStub, kind: CallableKind) -> Callable {
    let params: Vec<Type> = method.parsed_descriptor.params.iter().map(field_type).collect();
    let return_ty = return_type(&method.parsed_descriptor.return_type);

    // Signatures of inner-class constructors may omit synthetic parameters;
    // only trust one that lines up with the descriptor.
    let sig = method
        .signature
        .as_ref()
        .filter(|sig| sig.parameters.len() == params.len());
    let generic_params = sig
        .map(|sig| sig.parameters.iter().map(signature_type).collect())
        .unwrap_or_else(|| params.clone());
    let generic_return = match sig {
        Some(sig) => sig
            .return_type
            .as_ref()
            .map(signature_type)
            .unwrap_or_else(Type::void),
        None => return_ty.clone(),
    };

    Callable {
        owner: owner.to_string(),
        name: method.name.clone(),
        kind,
        params,
        generic_params,
        return_type: return_ty,
        generic_return,
        type_params: sig.map(|sig| type_params(&sig.type_parameters)).unwrap_or_default(),
        is_varargs: method.access_flags & ACC_VARARGS != 0,
        is_static: method.access_flags & ACC_STATIC != 0,
        is_abstract: method.access_flags & ACC_ABSTRACT != 0,
        is_interface_owner: owner_kind == ClassKind::Interface,
        access_flags: method.access_flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jdk::BuiltinJdk;
    use crate::provider::ClassProvider;
    use pretty_assertions::assert_eq;

    #[test]
    fn list_methods_keep_class_variables() {
        let stub = BuiltinJdk.lookup("java.util.ArrayList").unwrap();
        let def = class_def(&stub);
        assert_eq!(def.type_params.len(), 1);
        assert_eq!(
            def.interfaces[0],
            Type::parameterised("java.util.List", vec![Type::Variable("E".into())])
        );

        let get = def.methods.iter().find(|m| m.name == "get").unwrap();
        assert_eq!(get.params, vec![Type::int()]);
        assert_eq!(get.return_type, Type::object());
        assert_eq!(get.generic_return, Type::Variable("E".into()));
        assert!(get.is_class_variable("E"));

        let copy = def
            .constructors
            .iter()
            .find(|c| c.params.len() == 1 && c.params[0].is_reference())
            .unwrap();
        assert_eq!(
            copy.generic_params[0],
            Type::parameterised("java.util.Collection", vec![Type::Variable("?".into())])
        );
    }

    #[test]
    fn method_type_parameters_are_recorded() {
        let def = class_def(&BuiltinJdk.lookup("java.util.Arrays").unwrap());
        let as_list = def.methods.iter().find(|m| m.name == "asList").unwrap();
        assert!(as_list.is_varargs && as_list.is_static);
        assert_eq!(as_list.type_params.len(), 1);
        assert!(!as_list.is_class_variable("T"));
        assert_eq!(
            as_list.generic_params[0],
            Type::array_of(Type::Variable("T".into()))
        );
    }
}
