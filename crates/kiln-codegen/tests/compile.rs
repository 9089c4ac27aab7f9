use std::sync::Arc;

use kiln_classfile::{mnemonics, ClassFile};
use kiln_codegen::{CompiledUnit, Compiler, FileOutcome, SourceFile};
use kiln_config::CompilerOptions;
use kiln_types::{BuiltinJdk, Classes};
use pretty_assertions::assert_eq;

fn compiler() -> Compiler {
    compiler_with(CompilerOptions::default())
}

fn compiler_with(options: CompilerOptions) -> Compiler {
    Compiler::new(Classes::new(Arc::new(BuiltinJdk)), options)
}

fn compile(text: &str) -> FileOutcome {
    let mut outcomes = compiler().compile_batch(&[SourceFile::new("Test.kiln", text)]);
    assert_eq!(outcomes.len(), 1);
    outcomes.remove(0)
}

fn units(text: &str) -> Vec<CompiledUnit> {
    match compile(text) {
        Ok(units) => units,
        Err(failure) => panic!("compilation failed:\n{}", failure.report()),
    }
}

fn messages(text: &str) -> Vec<String> {
    match compile(text) {
        Ok(_) => panic!("compilation unexpectedly succeeded"),
        Err(failure) => failure.diagnostics.iter().map(|d| d.message.clone()).collect(),
    }
}

fn code_of(unit: &CompiledUnit, name: &str, descriptor: &str) -> Vec<&'static str> {
    let class = ClassFile::parse(&unit.bytes).unwrap();
    let method = class.method(name, descriptor).unwrap();
    let code = method.code.as_ref().unwrap();
    mnemonics(&code.code).unwrap()
}

#[test]
fn empty_class_gets_only_a_default_constructor() {
    let units = units("class Empty { }");
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].name, "Empty");
    assert!(units[0].warnings.is_empty());

    let class = ClassFile::parse(&units[0].bytes).unwrap();
    assert!(class.fields.is_empty());
    assert_eq!(class.methods.len(), 1);
    assert_eq!(
        code_of(&units[0], "<init>", "()V"),
        vec!["aload_0", "invokespecial", "return"]
    );
}

#[test]
fn string_into_num_field_is_one_error() {
    let messages = messages("class A {\n  Num x;\n  Void f() { x = \"s\"; }\n}");
    assert_eq!(
        messages,
        vec!["Cannot assign expression of type java.lang.String to field of type Num".to_string()]
    );
}

#[test]
fn unknown_local_is_reported_once() {
    let messages = messages("class A {\n  Void f() {\n    Int y = x;\n    Int z = 2;\n  }\n}");
    assert_eq!(messages, vec!["Unknown local variable 'x'".to_string()]);
}

#[test]
fn failure_report_lists_sorted_lines_after_the_file_name() {
    let Err(failure) = compile("class A {\n  Void f() {\n    Int y = x;\n    Int z = w;\n  }\n}") else {
        panic!("expected a failure");
    };
    assert_eq!(
        failure.report(),
        "Test.kiln\nline 3:12 Unknown local variable 'x'.\nline 4:12 Unknown local variable 'w'."
    );
}

#[test]
fn mutually_referencing_files_need_the_batch() {
    let files = [
        SourceFile::new("A.kiln", "class A {\n  B other;\n}"),
        SourceFile::new("B.kiln", "class B {\n  A other;\n}"),
    ];

    let outcomes = compiler().compile_batch(&files);
    assert!(outcomes.iter().all(Result::is_ok));

    let outcomes = compiler().compile_single_pass(&files);
    let Err(failure) = &outcomes[0] else {
        panic!("A compiled without seeing B");
    };
    assert!(failure.diagnostics.iter().any(|d| d.message == "Unknown type 'B'"));
}

#[test]
fn code_after_an_exhaustive_if_is_unreachable() {
    let messages = messages(
        "class R {\n  Void f() {\n    if (true) return; else return;\n    Int y = 1;\n  }\n}",
    );
    assert_eq!(messages, vec!["Unreachable statement".to_string()]);
}

#[test]
fn missing_return_is_reported() {
    let messages = messages("class R {\n  Int f(Bool b) {\n    if (b) return 1;\n  }\n}");
    assert_eq!(messages, vec!["Missing return statement".to_string()]);
}

#[test]
fn int_locals_step_with_iinc() {
    let units = units("class S {\n  Void f() {\n    Int i = 0;\n    i++;\n  }\n}");
    assert_eq!(
        code_of(&units[0], "f", "()V"),
        vec!["iconst_0", "istore_1", "iinc", "return"]
    );
}

#[test]
fn long_comparison_uses_lcmp() {
    let units = units("class C {\n  Bool f(Long a, Long b) {\n    return a < b;\n  }\n}");
    let code = code_of(&units[0], "f", "(JJ)Z");
    assert!(code.contains(&"lcmp"), "{code:?}");
    assert_eq!(code.last(), Some(&"ireturn"));
}

#[test]
fn string_concatenation_goes_through_a_builder() {
    let units = units("class C {\n  String f(String s, Int n) {\n    return s + n;\n  }\n}");
    let code = code_of(&units[0], "f", "(Ljava/lang/String;I)Ljava/lang/String;");
    assert_eq!(code.first(), Some(&"new"));
    assert!(code.iter().filter(|op| **op == "invokevirtual").count() >= 3, "{code:?}");
    assert_eq!(code.last(), Some(&"areturn"));
}

#[test]
fn field_initialisers_run_after_the_super_call() {
    let units = units("class P {\n  Int x = 3;\n  P() { }\n}");
    assert_eq!(
        code_of(&units[0], "<init>", "()V"),
        vec!["aload_0", "invokespecial", "aload_0", "iconst_3", "putfield", "return"]
    );
}

#[test]
fn static_initialisers_land_in_clinit() {
    let units = units("class K {\n  static Int count = 7;\n}");
    assert_eq!(
        code_of(&units[0], "<clinit>", "()V"),
        vec!["bipush", "putstatic", "return"]
    );
}

#[test]
fn missing_interface_method_is_reported() {
    let messages = messages("interface Shape {\n  Num area();\n}\nclass Square implements Shape { }");
    assert_eq!(
        messages,
        vec!["Class Square does not implement method area() of interface Shape".to_string()]
    );
}

#[test]
fn duplicate_classes_keep_the_first() {
    let files = [
        SourceFile::new("One.kiln", "class Twice { }"),
        SourceFile::new("Two.kiln", "class Twice { }"),
    ];
    let outcomes = compiler().compile_batch(&files);
    assert!(outcomes[0].is_ok());
    let Err(failure) = &outcomes[1] else {
        panic!("second declaration compiled");
    };
    assert_eq!(failure.diagnostics[0].message, "Duplicate class 'Twice'");
}

#[test]
fn warnings_as_errors_fails_the_file() {
    let source = "import java.util.ArrayList;\nclass G {\n  Void f() {\n    ArrayList<String> xs = new ArrayList<String>();\n    xs.add(1);\n  }\n}";
    let lenient = compiler().compile_batch(&[SourceFile::new("G.kiln", source)]);
    let Ok(units) = &lenient[0] else {
        panic!("type parameter mismatch should only warn");
    };
    assert_eq!(units[0].warnings.len(), 1);

    let strict = compiler_with(CompilerOptions {
        warnings_as_errors: true,
        ..CompilerOptions::default()
    })
    .compile_batch(&[SourceFile::new("G.kiln", source)]);
    assert!(strict[0].is_err());
}

#[test]
fn locals_leave_scope_with_their_block() {
    let messages = messages(
        "class Scope {\n  Int pick(Bool c) {\n    if (c) { Int x = 7; }\n    return x;\n  }\n}",
    );
    assert_eq!(messages, vec!["Unknown local variable 'x'".to_string()]);
}

#[test]
fn sequential_loops_reuse_the_counter_name_and_slot() {
    let units = units(
        "class Loops {\n  Int sum() {\n    Int total = 0;\n    for (Int i = 0; i < 3; i++) { total += i; }\n    for (Int i = 0; i < 2; i++) { total += i; }\n    return total;\n  }\n}",
    );
    let class = ClassFile::parse(&units[0].bytes).unwrap();
    let method = class.method("sum", "()I").unwrap();
    assert_eq!(method.code.as_ref().unwrap().max_locals, 3);
}

const FIELD_FLOW: &str = "class Flow {
  Int f;
  Int g = 1;
  Flow(Bool c) {
    if (c) { f = 1; }
    Int a = f;
    Int b = g;
  }
  Flow(Bool c, Bool d) {
    if (c) { f = 1; } else { if (d) { f = 2; } else { f = 3; } }
    Int a = this.f;
  }
  Flow(Int n) {
    while (n > 0) { f = n; n = n - 1; }
    Int a = f;
  }
  Flow() {
    this(true);
    Int a = f;
  }
}";

#[test]
fn constructor_field_reads_follow_assignments_on_every_path() {
    let Err(failure) = compile(FIELD_FLOW) else {
        panic!("partially assigned fields were accepted");
    };
    let mut found: Vec<(u32, &str)> = failure
        .diagnostics
        .iter()
        .map(|d| (d.coordinate.line, d.message.as_str()))
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec![
            (6, "Field 'f' is read before it is assigned"),
            (15, "Field 'f' is read before it is assigned"),
        ]
    );
}
