use kiln_core::{Coordinate, Diagnostic, DiagnosticReport};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn report_is_sorted_by_line() {
    let diagnostics = vec![
        Diagnostic::error("type", Coordinate::new(5, 0), "five"),
        Diagnostic::error("type", Coordinate::new(2, 7), "two"),
        Diagnostic::error("type", Coordinate::new(9, 1), "nine"),
    ];

    assert_eq!(
        DiagnosticReport::render(&diagnostics),
        "line 2:7 two.\nline 5:0 five.\nline 9:1 nine."
    );
}

#[test]
fn same_line_orders_by_column() {
    let diagnostics = vec![
        Diagnostic::error("type", Coordinate::new(4, 12), "b"),
        Diagnostic::error("type", Coordinate::new(4, 3), "a"),
    ];
    assert_eq!(
        DiagnosticReport::render(&diagnostics),
        "line 4:3 a.\nline 4:12 b."
    );
}

#[test]
fn has_errors_ignores_warnings() {
    let warnings = vec![Diagnostic::warning("type-parameter", Coordinate::new(1, 0), "w")];
    assert!(!DiagnosticReport::has_errors(&warnings));
}

proptest! {
    #[test]
    fn rendering_is_order_independent(lines in prop::collection::vec(1u32..200, 0..16)) {
        let diagnostics: Vec<Diagnostic> = lines
            .iter()
            .map(|line| Diagnostic::error("type", Coordinate::new(*line, 0), format!("at {line}")))
            .collect();
        let mut reversed = diagnostics.clone();
        reversed.reverse();

        prop_assert_eq!(
            DiagnosticReport::render(&diagnostics),
            DiagnosticReport::render(&reversed)
        );

        let rendered = DiagnosticReport::render(&diagnostics);
        let rendered_lines: Vec<u32> = rendered
            .lines()
            .map(|l| l["line ".len()..].split(':').next().unwrap().parse().unwrap())
            .collect();
        let mut sorted = lines.clone();
        sorted.sort();
        prop_assert_eq!(rendered_lines, sorted);
    }
}
