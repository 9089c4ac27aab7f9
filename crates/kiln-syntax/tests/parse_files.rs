use kiln_core::Coordinate;
use kiln_syntax::ast::*;
use kiln_syntax::{parse, MISSING_TERMINATOR, SYNTAX};
use pretty_assertions::assert_eq;

const SHAPES: &str = r#"import java.util.List;
import java.util.*;

const Int LIMIT = 10;

interface Shape extends Comparable<Shape> {
    Num area();
}

class Box<T extends Comparable<T> & java.io.Serializable> implements Shape {
    static Int count = 0;
    T item;
    Num side;

    Box(T item, Num side) {
        super();
        this.item = item;
        this.side = side;
        count += 1;
    }

    Num area() {
        return side * side;
    }

    Int compareTo(Shape other) {
        if (area() < other.area()) return -1;
        else if (area() > other.area()) return 1;
        return 0;
    }

    static Void log(String... parts) {
        for (Int i = 0; i < parts.length; i++) {
            System.out.println(parts[i]);
        }
        var attempt_ok = attempt Integer.parseInt("12");
        while (false) { }
        Long big = 10L as Long;
        Int[] xs = new Int[3];
    }
}
"#;

#[test]
fn parses_a_complete_file() {
    let parsed = parse(SHAPES).unwrap();
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    let file = parsed.file;

    assert_eq!(
        file.imports
            .iter()
            .map(|i| (i.path.as_str(), i.is_star))
            .collect::<Vec<_>>(),
        vec![("java.util.List", false), ("java.util", true)]
    );
    assert_eq!(file.imports[0].simple_name(), Some("List"));
    assert_eq!(file.constants[0].name, "LIMIT");

    let shape = &file.classes[0];
    assert!(shape.is_interface());
    assert_eq!(shape.extends[0].to_string(), "Comparable<Shape>");
    assert!(shape.methods().next().is_some_and(|m| m.body.is_none()));

    let boxed = &file.classes[1];
    assert_eq!(boxed.at, Coordinate::new(10, 0));
    assert_eq!(boxed.type_params.len(), 1);
    assert_eq!(boxed.type_params[0].bounds.len(), 2);
    assert_eq!(boxed.implements[0].name, "Shape");
    assert_eq!(boxed.fields().count(), 3);
    assert!(boxed.fields().next().is_some_and(|f| f.is_static && f.init.is_some()));
    assert_eq!(boxed.constructors().count(), 1);

    let log = boxed.methods().find(|m| m.name == "log").unwrap();
    assert!(log.is_static);
    assert!(log.params[0].variadic);
    assert_eq!(log.params[0].ty.name, "String");
    let body = log.body.as_ref().unwrap();
    assert!(matches!(body.statements[0].kind, StmtKind::For { .. }));
    match &body.statements[1].kind {
        StmtKind::Local { ty: None, init: Some(init), .. } => {
            assert!(matches!(init.kind, ExprKind::Attempt(_)));
        }
        other => panic!("unexpected {other:?}"),
    }
    match &body.statements[4].kind {
        StmtKind::Local { init: Some(init), .. } => {
            assert!(matches!(init.kind, ExprKind::NewArray { .. }));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn constructor_body_calls() {
    let parsed = parse(SHAPES).unwrap();
    let ctor = parsed.file.classes[1].constructors().next().cloned().unwrap();
    let kinds: Vec<&StmtKind> = ctor.body.statements.iter().map(|s| &s.kind).collect();
    assert!(matches!(kinds[0], StmtKind::Expr(Expr { kind: ExprKind::SuperCall(args), .. }) if args.is_empty()));
    match kinds[1] {
        StmtKind::Assign { target, op: AssignOp::Set, .. } => assert_eq!(target.this_field(), Some("item")),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(kinds[3], StmtKind::Assign { op: AssignOp::Add, .. }));
}

#[test]
fn qualified_names_read_as_dotted() {
    let parsed = parse("class A { Void f() { java.lang.System.out.println(1); } }").unwrap();
    let body = parsed.file.classes[0].methods().next().cloned().unwrap().body.unwrap();
    let StmtKind::Expr(Expr { kind: ExprKind::Call { target: Some(target), .. }, .. }) = &body.statements[0].kind else {
        panic!("expected a call");
    };
    assert_eq!(target.dotted_name().as_deref(), Some("java.lang.System.out"));
}

#[test]
fn several_missing_terminators_are_all_reported() {
    let parsed = parse("class A {\n  Void f() {\n    Int a = 1\n    Int b = 2\n    a = b;\n  }\n}").unwrap();
    let found: Vec<(u32, &str)> = parsed
        .diagnostics
        .iter()
        .map(|d| (d.coordinate.line, d.code))
        .collect();
    assert_eq!(found, vec![(3, MISSING_TERMINATOR), (4, MISSING_TERMINATOR)]);
    assert_eq!(parsed.diagnostics[0].to_string(), "line 3:13 Missing ';'.");
}

#[test]
fn syntax_errors_stop_the_file() {
    for src in [
        "class { }",
        "class A { Void f() { if x { } } }",
        "class A extends { }",
        "class A { Void f(Int... a, Int b) { } }",
        "class A { B() { } }",
        "class A { Void f() { x = \"open; } }",
        "Int x = 3;",
    ] {
        let errors = parse(src).unwrap_err();
        assert!(errors.iter().any(|d| d.code == SYNTAX), "{src}: {errors:?}");
    }
}
