use kiln_core::{Coordinate, Diagnostic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDiagnosticKind {
    UnassignedField,
    UnreachableStatement,
    MissingReturn,
}

impl FlowDiagnosticKind {
    pub fn code(self) -> &'static str {
        match self {
            FlowDiagnosticKind::UnassignedField => "unassigned-field",
            FlowDiagnosticKind::UnreachableStatement => "unreachable",
            FlowDiagnosticKind::MissingReturn => "missing-return",
        }
    }
}

pub fn diagnostic(kind: FlowDiagnosticKind, at: Coordinate, message: impl Into<String>) -> Diagnostic {
    Diagnostic::error(kind.code(), at, message)
}

pub fn unassigned_field(name: &str, at: Coordinate) -> Diagnostic {
    diagnostic(
        FlowDiagnosticKind::UnassignedField,
        at,
        format!("Field '{name}' is read before it is assigned"),
    )
}

pub fn unreachable_statement(at: Coordinate) -> Diagnostic {
    diagnostic(FlowDiagnosticKind::UnreachableStatement, at, "Unreachable statement")
}

pub fn missing_return(at: Coordinate) -> Diagnostic {
    diagnostic(FlowDiagnosticKind::MissingReturn, at, "Missing return statement")
}
