//! CLI integration tests
//!
//! Every run uses `--offline` so no fixture server is contacted.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn tester() -> Command {
    Command::cargo_bin("fixture-tester").unwrap()
}

fn write_suites(root: &Path, json: &str) -> std::path::PathBuf {
    let path = root.join("suites.json");
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_help_output() {
    tester()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--stop-on-failure"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("promote"));
}

#[test]
fn test_version_output() {
    tester()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(fixture_tester::VERSION));
}

#[test]
fn test_suite_required_for_generic_binary() {
    let root = TempDir::new().unwrap();
    tester()
        .args(["--offline", "--root"])
        .arg(root.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Can't figure out the suite"));
}

#[test]
fn test_unknown_suite() {
    let root = TempDir::new().unwrap();
    tester()
        .args(["a99", "--offline", "--root"])
        .arg(root.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown suite 'a99'"));
}

#[test]
fn test_unknown_operation_is_fatal() {
    let root = TempDir::new().unwrap();
    let suites = write_suites(root.path(), r#"{"s1": [{"file": "p.sh", "ops": ["shuffle"]}]}"#);
    tester()
        .args(["s1", "--offline", "--root"])
        .arg(root.path())
        .arg("--suites")
        .arg(&suites)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown normalization operation 'shuffle'"));
}

#[test]
fn test_offline_without_fixtures() {
    let root = TempDir::new().unwrap();
    tester()
        .args(["a5", "--offline", "--root"])
        .arg(root.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("without --offline"));
}

#[cfg(unix)]
#[test]
fn test_offline_run_reports_failures() {
    let root = TempDir::new().unwrap();
    let suites = write_suites(root.path(), r#"{"s1": [{"file": "copy.sh"}]}"#);
    fs::write(root.path().join("copy.sh"), "cat\n").unwrap();

    let dir = root.path().join("test-s1");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("copy-input-01.txt"), "same\n").unwrap();
    fs::write(dir.join("copy-expected-01.txt"), "same\n").unwrap();
    fs::write(dir.join("copy-input-02.txt"), "got\n").unwrap();
    fs::write(dir.join("copy-expected-02.txt"), "wanted\n").unwrap();

    tester()
        .args(["s1", "--offline", "--interpreter", "sh", "--diff-style", "unified", "--root"])
        .arg(root.path())
        .arg("--suites")
        .arg(&suites)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("copy: Running test 01...PASSED"))
        .stdout(predicate::str::contains("copy: Running test 02...FAILED"))
        .stdout(predicate::str::contains("-wanted"))
        .stdout(predicate::str::contains("+got"));

    let html = fs::read_to_string(root.path().join("test-s1-report.html")).unwrap();
    assert!(html.contains("1 passed, 1 failed"));
}

#[test]
fn test_generate_command() {
    let root = TempDir::new().unwrap();
    tester()
        .args(["generate", "a5", "ngrams.py", "fl", "--root"])
        .arg(root.path())
        .write_stdin("# comment\nwords.txt\n3\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 1 input files"));

    let dir = root.path().join("test-a5");
    assert_eq!(
        fs::read_to_string(dir.join("ngrams-input-01.txt")).unwrap(),
        "test-a5/words.txt\n3\n"
    );
    assert!(dir.join("ngrams-expected-01.txt").is_file());
}

#[test]
fn test_promote_command() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("test-a5");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("bball-input-01.txt"), "x\n").unwrap();
    fs::write(dir.join("bball-actual-01.txt"), "y\n").unwrap();

    tester()
        .args(["promote", "a5", "bball", "--root"])
        .arg(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Promoted 1 actual outputs"));

    assert_eq!(fs::read_to_string(dir.join("bball-expected-01.txt")).unwrap(), "y\n");
}
