//! Flow facts shared by statement lowering: definite field assignment and
//! the diagnostics reachability and assignment checks produce.

mod assignment;
mod diagnostics;

pub use crate::assignment::FieldAssignment;
pub use crate::diagnostics::{
    diagnostic, missing_return, unassigned_field, unreachable_statement, FlowDiagnosticKind,
};
