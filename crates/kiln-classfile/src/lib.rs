//! Reading and writing JVM class files.
//!
//! The reader keeps what a type catalog needs (names, flags, descriptors,
//! generic signatures, code); the writer emits version 49 class files from
//! symbolic [`Instruction`]s.

#![forbid(unsafe_code)]

mod classfile;
mod code;
mod constant_pool;
mod descriptor;
mod error;
mod reader;
mod signature;
mod stub;
mod writer;

pub use crate::classfile::{ClassFile, ClassMember, CodeInfo, ExceptionHandler};
pub use crate::code::{
    assemble, mnemonics, ArrayType, CodeAttribute, Constant, FieldOp, HandlerEntry, Instruction,
    InvokeKind, JumpOp, Label, LocalKind, Opcode, TypeOp,
};
pub use crate::descriptor::{parse_field_descriptor, parse_method_descriptor};
pub use crate::descriptor::{BaseType, FieldType, MethodDescriptor, ReturnType};
pub use crate::error::{Error, Result};
pub use crate::signature::{
    parse_class_signature, parse_field_signature, parse_method_signature, ClassSignature,
    ClassTypeSignature, FieldTypeSignature, MethodSignature, SimpleClassTypeSignature,
    TypeArgument, TypeParameter, TypeSignature,
};
pub use crate::stub::{
    ClassStub, FieldStub, MethodStub, ACC_ABSTRACT, ACC_FINAL, ACC_INTERFACE, ACC_PRIVATE,
    ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC, ACC_SUPER, ACC_VARARGS,
};
pub use crate::writer::{
    ClassWriter, ConstantPoolBuilder, FieldSpec, MethodCode, MethodSpec, MAJOR_VERSION,
};
