//! Lowering of parsed Kiln source to JVM class files.
//!
//! [`Compiler`] drives the passes: class shapes first, then member
//! signatures, then bodies. Bodies lower to [`Fragment`]s, which carry
//! instructions and diagnostics together so a construct that fails to type
//! still lets its neighbours report.

pub mod codes;
mod call;
mod condition;
mod driver;
mod error;
mod expr;
mod fragment;
mod lower;
mod ops;
mod optimize;
mod passes;
mod resolve;
mod stmt;
mod variables;

pub use driver::{CompileFailure, CompiledUnit, Compiler, FileOutcome, SourceFile};
pub use error::CompileError;
pub use fragment::Fragment;
pub use optimize::constant_locals;
pub use resolve::Scope;
pub use variables::{Constants, FileConstant, Variable, Variables};
