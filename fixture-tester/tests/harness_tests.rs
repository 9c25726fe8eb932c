//! Harness integration tests
//!
//! Fixtures are served from memory and the programs under test are small
//! shell scripts, so these tests need neither a network nor Python.

#![cfg(unix)]

use std::fs;
use std::future::poll_fn;
use std::path::Path;
use std::task::Poll;
use std::time::{Duration, Instant};

use fixture_tester::fixtures::MemorySource;
use fixture_tester::{SuiteHarness, SuiteTable, SyncOutcome, TestConfig};
use tempfile::TempDir;

const LISTING: &str = r#"<ul>
<li><a href="copy-input-01.txt">copy-input-01.txt</a></li>
<li><a href="copy-expected-01.txt">copy-expected-01.txt</a></li>
<li><a href="copy-input-02.txt">copy-input-02.txt</a></li>
<li><a href="copy-expected-02.txt">copy-expected-02.txt</a></li>
</ul>"#;

fn table() -> SuiteTable {
    SuiteTable::from_json(r#"{"s1": [{"file": "copy.sh"}], "s2": [{"file": "shuffle.sh", "ops": ["sort"]}], "s3": [{"file": "stall.sh"}]}"#)
        .unwrap()
}

fn config(root: &Path, suite: &str) -> TestConfig {
    let mut config = TestConfig::new(suite, root);
    config.interpreter = Some("sh".to_string());
    config.quiet = true;
    config
}

fn setup(root: &Path) {
    fs::write(root.join("copy.sh"), "cat\n").unwrap();
    fs::write(root.join("shuffle.sh"), "printf 'b\\na\\n'\n").unwrap();
    fs::write(root.join("stall.sh"), "echo started\nsleep 5\n").unwrap();
}

fn write_case(dir: &Path, program: &str, label: &str, input: &str, expected: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(format!("{}-input-{}.txt", program, label)), input).unwrap();
    fs::write(dir.join(format!("{}-expected-{}.txt", program, label)), expected).unwrap();
}

fn source() -> MemorySource {
    let mut source = MemorySource::new();
    source.insert("", LISTING);
    source.insert("copy-input-01.txt", "one\ntwo\n");
    source.insert("copy-expected-01.txt", "one\ntwo\n");
    source.insert("copy-input-02.txt", "three\n");
    source.insert("copy-expected-02.txt", "four\n");
    source.insert("testfiles.txt", "");
    source.insert("version.txt", "7\n");
    source
}

#[tokio::test]
async fn test_sync_then_run() {
    let root = TempDir::new().unwrap();
    setup(root.path());

    let harness = SuiteHarness::with_table(config(root.path(), "s1"), &table()).unwrap();
    let outcome = harness.sync(source()).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Rebuilt { version: "7".to_string(), files: 4 });
    assert_eq!(harness.sync(source()).await.unwrap(), SyncOutcome::Current { version: "7".to_string() });

    let summary = harness.run_cases(std::future::pending()).await.unwrap();
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
    assert!(!summary.interrupted);
    assert!(!summary.all_passed());

    let dir = harness.suite().dir.clone();
    assert_eq!(fs::read_to_string(dir.join("copy-actual-02.txt")).unwrap(), "three\n");

    let html = fs::read_to_string(&summary.report_path).unwrap();
    assert!(summary.report_path.ends_with("test-s1-report.html"));
    assert!(html.contains("<details class=\"case pass\">"));
    assert!(html.contains("<details class=\"case fail\" open>"));
    assert!(html.contains("four"));
    assert!(html.trim_end().ends_with("</html>"));
}

#[tokio::test]
async fn test_stop_on_failure() {
    let root = TempDir::new().unwrap();
    setup(root.path());
    let dir = root.path().join("test-s1");
    write_case(&dir, "copy", "01", "x\n", "y\n");
    write_case(&dir, "copy", "02", "x\n", "x\n");

    let mut config = config(root.path(), "s1");
    config.stop_on_failure = true;
    let harness = SuiteHarness::with_table(config, &table()).unwrap();

    let summary = harness.run_cases(std::future::pending()).await.unwrap();
    assert_eq!((summary.passed, summary.failed), (0, 1));
    assert!(summary.stopped_early);
    assert!(!dir.join("copy-actual-02.txt").exists());
}

#[tokio::test]
async fn test_interrupt_finalizes_report() {
    let root = TempDir::new().unwrap();
    setup(root.path());
    write_case(&root.path().join("test-s1"), "copy", "01", "x\n", "x\n");

    let harness = SuiteHarness::with_table(config(root.path(), "s1"), &table()).unwrap();
    let summary = harness.run_cases(async {}).await.unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.total(), 0);
    let html = fs::read_to_string(&summary.report_path).unwrap();
    assert!(html.contains("Execution was interrupted"));
    assert!(html.trim_end().ends_with("</html>"));
}

#[tokio::test]
async fn test_interrupt_while_case_runs() {
    let root = TempDir::new().unwrap();
    setup(root.path());
    let dir = root.path().join("test-s3");
    write_case(&dir, "stall", "01", "", "started\n");
    write_case(&dir, "stall", "02", "", "started\n");

    let harness = SuiteHarness::with_table(config(root.path(), "s3"), &table()).unwrap();
    let start = Instant::now();
    let summary = harness.run_cases(tokio::time::sleep(Duration::from_millis(200))).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(4));
    assert!(summary.interrupted);
    assert_eq!(summary.total(), 0);
    assert!(dir.join("stall-actual-01.txt").exists());
    assert!(!dir.join("stall-actual-02.txt").exists());

    let html = fs::read_to_string(&summary.report_path).unwrap();
    assert!(html.contains("Execution was interrupted"));
    assert!(html.trim_end().ends_with("</html>"));
}

#[tokio::test]
async fn test_interrupt_after_last_case_is_reported() {
    let root = TempDir::new().unwrap();
    setup(root.path());
    write_case(&root.path().join("test-s1"), "copy", "01", "x\n", "x\n");

    let harness = SuiteHarness::with_table(config(root.path(), "s1"), &table()).unwrap();
    let report_path = root.path().join("test-s1-report.html");
    // Fires only once the case has been written to the report
    let interrupt = poll_fn(|_| {
        let recorded = fs::read_to_string(&report_path)
            .map(|html| html.contains("<details class=\"case pass\">"))
            .unwrap_or(false);
        if recorded {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    });

    let summary = harness.run_cases(interrupt).await.unwrap();
    assert!(summary.interrupted);
    assert_eq!((summary.passed, summary.failed), (1, 0));
    assert!(!summary.all_passed());
    let html = fs::read_to_string(&summary.report_path).unwrap();
    assert!(html.contains("Execution was interrupted"));
}

#[tokio::test]
async fn test_normalized_output_passes() {
    let root = TempDir::new().unwrap();
    setup(root.path());
    write_case(&root.path().join("test-s2"), "shuffle", "1", "", "a\nb\n");

    let harness = SuiteHarness::with_table(config(root.path(), "s2"), &table()).unwrap();
    let summary = harness.run_cases(std::future::pending()).await.unwrap();
    assert_eq!((summary.passed, summary.failed), (1, 0));
    assert!(summary.all_passed());
}

#[tokio::test]
async fn test_missing_program_is_fatal() {
    let root = TempDir::new().unwrap();
    write_case(&root.path().join("test-s1"), "copy", "01", "x\n", "x\n");

    let harness = SuiteHarness::with_table(config(root.path(), "s1"), &table()).unwrap();
    let err = harness.run_cases(std::future::pending()).await.unwrap_err();
    assert!(err.to_string().contains("copy.sh"));
}

#[tokio::test]
async fn test_failed_sync_leaves_no_version() {
    let root = TempDir::new().unwrap();
    setup(root.path());
    let mut source = source();
    source.remove("copy-expected-02.txt");

    let harness = SuiteHarness::with_table(config(root.path(), "s1"), &table()).unwrap();
    assert!(harness.sync(source).await.is_err());
    assert!(!harness.suite().dir.join("version.txt").exists());
}
