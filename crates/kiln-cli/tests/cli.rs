use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn kiln() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("kiln"))
}

#[test]
fn help_mentions_commands() {
    kiln().arg("--help").assert().success().stdout(
        predicate::str::contains("compile").and(predicate::str::contains("check")),
    );
}

#[test]
fn compile_writes_one_class_file_per_class() {
    let temp = TempDir::new().unwrap();
    temp.child("Shapes.kiln")
        .write_str("class Point {\n  Int x;\n  Int y;\n}\nclass Origin { }\n")
        .unwrap();

    kiln()
        .current_dir(temp.path())
        .args(["compile", "Shapes.kiln", "-o", "classes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("summary: 2 classes, 0 of 1 files failed"));

    let point = std::fs::read(temp.child("classes/Point.class").path()).unwrap();
    assert_eq!(&point[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    temp.child("classes/Origin.class").assert(predicate::path::is_file());
}

#[test]
fn failing_file_reports_and_exits_one() {
    let temp = TempDir::new().unwrap();
    temp.child("Good.kiln").write_str("class Good { }\n").unwrap();
    temp.child("Bad.kiln")
        .write_str("class Bad {\n  Void f() {\n    Int y = x;\n  }\n}\n")
        .unwrap();

    kiln()
        .current_dir(temp.path())
        .args(["compile", "Good.kiln", "Bad.kiln", "-o", "out"])
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("Bad.kiln\nline 3:12 Unknown local variable 'x'."),
        );

    temp.child("out/Good.class").assert(predicate::path::is_file());
    temp.child("out/Bad.class").assert(predicate::path::missing());
}

#[test]
fn check_json_summarises_without_writing() {
    let temp = TempDir::new().unwrap();
    temp.child("A.kiln").write_str("class A {\n  B b;\n}\n").unwrap();
    temp.child("B.kiln").write_str("class B {\n  A a;\n}\n").unwrap();

    let output = kiln()
        .current_dir(temp.path())
        .args(["check", "A.kiln", "B.kiln", "--json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["summary"]["failed"].as_u64().unwrap(), 0);
    assert_eq!(v["summary"]["classes"].as_u64().unwrap(), 2);
    assert_eq!(v["files"][0]["classes"][0].as_str().unwrap(), "A");
    temp.child("out").assert(predicate::path::missing());
}

#[test]
fn config_file_sets_the_output_directory() {
    let temp = TempDir::new().unwrap();
    temp.child("kiln.toml")
        .write_str("[compiler]\noutput_dir = \"build\"\n\n[logging]\nstderr = false\n")
        .unwrap();
    temp.child("A.kiln").write_str("class A { }\n").unwrap();

    kiln()
        .current_dir(temp.path())
        .args(["compile", "A.kiln"])
        .assert()
        .success();

    temp.child("build/A.class").assert(predicate::path::is_file());
}

#[test]
fn unreadable_input_exits_two() {
    let temp = TempDir::new().unwrap();
    kiln()
        .current_dir(temp.path())
        .args(["check", "Missing.kiln"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to read Missing.kiln"));
}

#[test]
fn invalid_config_exits_two() {
    let temp = TempDir::new().unwrap();
    temp.child("kiln.toml").write_str("[compiler]\nunknown = 1\n").unwrap();
    temp.child("A.kiln").write_str("class A { }\n").unwrap();

    kiln()
        .current_dir(temp.path())
        .args(["check", "A.kiln"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to parse toml config"));
}
