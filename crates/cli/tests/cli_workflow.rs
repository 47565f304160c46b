use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

const SCRIPT: &str = r#"import os

def alpha():
    """Say where we are."""
    return os.getcwd()

def beta( ):
  return 2
"#;

fn codeflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("codeflow").expect("binary built");
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn project_with_script() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("script.py"), SCRIPT).unwrap();
    codeflow(dir.path())
        .args(["parse", "script.py"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Parsed 2 functions (2 new, 0 replaced)"));
    dir
}

#[test]
fn parse_then_list_and_show() {
    let dir = project_with_script();
    assert!(dir.path().join(".codeflow/project.json").exists());

    codeflow(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout("alpha\t3 lines\nbeta\t2 lines\n");

    codeflow(dir.path())
        .args(["show", "beta"])
        .assert()
        .success()
        .stdout("def beta():\n    return 2\n");
}

#[test]
fn generate_prints_program_with_driver() {
    let dir = project_with_script();

    codeflow(dir.path())
        .arg("generate")
        .assert()
        .success()
        .stdout(predicate::str::contains("def main():\n    alpha()\n    beta()\n"))
        .stdout(predicate::str::ends_with("if __name__ == '__main__':\n    main()\n"));
}

#[test]
fn docs_show_three_way_outcome() {
    let dir = project_with_script();

    codeflow(dir.path())
        .arg("docs")
        .assert()
        .success()
        .stdout("### alpha\nSay where we are.\n\n### beta\nNo docstring provided.\n\n");
}

#[test]
fn add_rejects_duplicates_and_syntax_errors() {
    let dir = project_with_script();

    codeflow(dir.path())
        .args(["add", "alpha", "--code", "def alpha():\n    pass\n"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    codeflow(dir.path())
        .args(["add", "gamma", "--code", "def gamma(:\n"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Syntax error"));

    codeflow(dir.path())
        .args(["add", "foo", "--code", "def bar():\n    pass\n"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not define a top-level function named 'foo'"));

    codeflow(dir.path())
        .args(["edit", "beta", "--code", "def alpha():\n    pass\n"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not define"));

    codeflow(dir.path())
        .args(["add", "gamma", "--code", "def gamma():\n  return 3"])
        .assert()
        .success();

    codeflow(dir.path())
        .args(["remove", "beta"])
        .assert()
        .success();

    codeflow(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout("alpha\t3 lines\ngamma\t2 lines\n");
}

#[test]
fn json_envelope() {
    let dir = project_with_script();

    let output = codeflow(dir.path())
        .args(["--json", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(value["data"][0]["name"], "alpha");
    assert_eq!(value["diagnostics"], serde_json::json!([]));

    let output = codeflow(dir.path())
        .args(["--json", "remove", "missing"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"], "error");
}

#[test]
fn export_writes_two_member_archive() {
    let dir = project_with_script();

    codeflow(dir.path())
        .args(["export", "-o", "out.zip"])
        .assert()
        .success();

    let file = fs::File::open(dir.path().join("out.zip")).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    assert_eq!(archive.len(), 2);

    let mut summary = String::new();
    archive
        .by_name("blocks_summary.txt")
        .unwrap()
        .read_to_string(&mut summary)
        .unwrap();
    assert!(summary.starts_with("### alpha\ndef alpha():\n"));
    assert!(archive.by_name("main.py").is_ok());
}

#[test]
fn format_reads_stdin_and_config_file() {
    let dir = TempDir::new().unwrap();

    codeflow(dir.path())
        .args(["format", "-"])
        .write_stdin("def f( a,b ):\n  return a\n")
        .assert()
        .success()
        .stdout("def f(a, b):\n    return a\n");

    fs::write(dir.path().join("codeflow.toml"), "[formatter]\nindent_width = 2\n").unwrap();
    codeflow(dir.path())
        .args(["format", "-"])
        .write_stdin("def f():\n    return 1\n")
        .assert()
        .success()
        .stdout("def f():\n  return 1\n");
}
