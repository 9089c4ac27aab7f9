//! Core shared types for Kiln.
//!
//! This crate is intentionally small: source coordinates and the diagnostics
//! every compiler stage accumulates.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

/// A position in a source file: 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Coordinate {
    pub line: u32,
    pub column: u32,
}

impl Coordinate {
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub coordinate: Coordinate,
    pub message: String,
}

impl Diagnostic {
    pub fn error(code: &'static str, coordinate: Coordinate, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            coordinate,
            message: message.into(),
        }
    }

    pub fn warning(code: &'static str, coordinate: Coordinate, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            coordinate,
            message: message.into(),
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Re-grade a warning as an error (`warnings_as_errors`).
    #[must_use]
    pub fn promoted(mut self) -> Self {
        self.severity = Severity::Error;
        self
    }
}

impl Ord for Diagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.coordinate
            .cmp(&other.coordinate)
            .then_with(|| self.severity.cmp(&other.severity))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.code.cmp(other.code))
    }
}

impl PartialOrd for Diagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Renders as `line <line>:<column> <message>.`; tooling parses this format.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}:{} {}",
            self.coordinate.line, self.coordinate.column, self.message
        )?;
        if !self.message.ends_with('.') {
            f.write_str(".")?;
        }
        Ok(())
    }
}

/// Deterministic multi-diagnostic rendering.
pub struct DiagnosticReport;

impl DiagnosticReport {
    /// Sort by coordinate and join one diagnostic per line.
    pub fn render(diagnostics: &[Diagnostic]) -> String {
        let mut sorted: Vec<&Diagnostic> = diagnostics.iter().collect();
        sorted.sort();
        sorted
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
        diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_appends_single_period() {
        let d = Diagnostic::error("type", Coordinate::new(3, 4), "Bad thing");
        assert_eq!(d.to_string(), "line 3:4 Bad thing.");

        let d = Diagnostic::error("type", Coordinate::new(3, 4), "Already ends.");
        assert_eq!(d.to_string(), "line 3:4 Already ends.");
    }

    #[test]
    fn promoted_warning_is_an_error() {
        let d = Diagnostic::warning("type-parameter", Coordinate::new(1, 0), "w");
        assert!(!d.is_error());
        assert!(d.promoted().is_error());
    }
}
