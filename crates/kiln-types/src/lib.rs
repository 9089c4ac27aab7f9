//! Kiln's type model and type catalog.
//!
//! [`Type`] values are plain data; every structural question (supertypes,
//! members, type parameters) is answered through a [`TypeEnv`], normally the
//! [`Classes`] catalog backed by a [`ClassProvider`].

mod assign;
mod bridge;
mod callable;
mod catalog;
mod class;
mod classpath;
mod coerce;
mod jdk;
mod members;
mod overload;
mod provider;
mod ty;

pub use crate::assign::view_as;
pub use crate::bridge::{class_def, field_type, return_type, signature_type};
pub use crate::callable::{Callable, CallableKind};
pub use crate::catalog::Classes;
pub use crate::class::{owner_bindings, ClassDef, ClassKind, FieldDef, TypeEnv, TypeParamDef};
pub use crate::classpath::{CatalogError, Classpath, ClasspathEntry};
pub use crate::coerce::primitive_conversion;
pub use crate::jdk::BuiltinJdk;
pub use crate::overload::{Arguments, Functions, MatchResult, MismatchedTypeParameter};
pub use crate::provider::{ChainProvider, ClassProvider, EmptyProvider};
pub use crate::ty::{MemberView, PrimitiveType, Type, ITERABLE, LIST, OBJECT, STRING, THROWABLE};
