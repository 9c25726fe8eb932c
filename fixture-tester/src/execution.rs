//! Test execution functionality

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;

use crate::comparison::{OutputComparator, OutputComparison};
use crate::config::ProgramSpec;
use crate::discovery::TestCase;
use crate::normalize::Normalizer;
use crate::TestError;

/// Marker opening a tag line at the top of an expected file. The rest of
/// that line lists extra normalization operations for the case.
pub const TAG_MARKER: &str = "#!";

/// How a case ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseOutcome {
    /// Normalized output matched
    Passed,
    /// Normalized output differed
    Failed,
    /// Output matched except for a missing final newline; still a failure
    MissingNewline,
}

impl CaseOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Result of running one case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub case: TestCase,
    pub outcome: CaseOutcome,
    /// Every operation applied: the program's, then the tag line's
    pub ops: Vec<String>,
    /// Raw contents of the input file
    pub input: String,
    /// Normalized expected lines
    pub expected: Vec<String>,
    /// Normalized actual lines
    pub actual: Vec<String>,
    pub comparison: OutputComparison,
    /// Existing suite files the input refers to
    pub aux_files: Vec<PathBuf>,
    /// Exit code of the program; informational only
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_pass()
    }
}

/// A program ready to launch
#[derive(Debug, Clone)]
pub struct Program {
    pub spec: ProgramSpec,
    /// Executable followed by its arguments
    pub command: Vec<String>,
}

impl Program {
    /// Work out how to launch `spec` from `root`. An explicit interpreter
    /// wins; Python files run under the first Python 3 found; anything else
    /// is executed directly.
    pub fn resolve(
        root: &Path,
        spec: &ProgramSpec,
        interpreter: Option<&[String]>,
    ) -> Result<Self, TestError> {
        let path = root.join(&spec.file);
        if !path.is_file() {
            return Err(TestError::ProgramNotFound(path));
        }

        let command = match interpreter {
            Some(interpreter) => {
                let mut command = interpreter.to_vec();
                command.push(spec.file.clone());
                command
            }
            None if spec.extension() == Some("py") => vec![find_python()?, spec.file.clone()],
            None => vec![path.to_string_lossy().into_owned()],
        };

        debug!("{} will run as {:?}", spec.file, command);
        Ok(Self { spec: spec.clone(), command })
    }
}

/// First of `python3` / `python` that answers `--version`
fn find_python() -> Result<String, TestError> {
    for candidate in ["python3", "python"] {
        let status = std::process::Command::new(candidate)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if matches!(status, Ok(status) if status.success()) {
            return Ok(candidate.to_string());
        }
    }
    Err(TestError::Config("Can't figure out how to run Python 3".to_string()))
}

/// Runs cases and judges their output
#[derive(Debug, Clone)]
pub struct CaseRunner {
    root: PathBuf,
    suite_dir: PathBuf,
    normalizer: Normalizer,
    comparator: OutputComparator,
}

impl CaseRunner {
    /// Runner for programs in `root` using fixtures from `suite_dir`
    pub fn new(
        root: impl Into<PathBuf>,
        suite_dir: impl Into<PathBuf>,
        normalizer: Normalizer,
        comparator: OutputComparator,
    ) -> Self {
        Self { root: root.into(), suite_dir: suite_dir.into(), normalizer, comparator }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Run `program` on `case` and compare its output with the expected output
    pub async fn run(&self, case: &TestCase, program: &Program) -> Result<CaseResult, TestError> {
        let (exit_code, duration) = self.execute(case, program).await?;

        let input = read_text(&case.input).await?;
        let expected = read_text(&case.expected).await?;
        let actual = read_text(&case.actual).await?;

        let mut result = self.evaluate(case, &program.spec, &expected, &actual)?;
        result.aux_files = referenced_files(&input, &self.root, &self.suite_dir);
        result.input = input;
        result.exit_code = exit_code;
        result.duration = duration;

        info!("{}: {:?} (exit {:?}, {:.2?})", case.name(), result.outcome, exit_code, duration);
        Ok(result)
    }

    /// Launch the program with the input on stdin and both output streams
    /// captured in the actual file.
    async fn execute(
        &self,
        case: &TestCase,
        program: &Program,
    ) -> Result<(Option<i32>, Duration), TestError> {
        let stdin = std::fs::File::open(&case.input).map_err(|e| {
            TestError::Execution(format!("Failed to open {}: {}", case.input.display(), e))
        })?;
        let stdout = std::fs::File::create(&case.actual).map_err(|e| {
            TestError::Execution(format!("Failed to create {}: {}", case.actual.display(), e))
        })?;
        let stderr = stdout.try_clone()?;

        let (executable, args) = program
            .command
            .split_first()
            .ok_or_else(|| TestError::Execution("Empty command".to_string()))?;

        let mut cmd = TokioCommand::new(executable);
        cmd.args(args)
            .current_dir(&self.root)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        let start_time = Instant::now();
        let status = cmd.status().await.map_err(|e| {
            TestError::Execution(format!("Failed to run {:?}: {}", program.command, e))
        })?;

        Ok((status.code(), start_time.elapsed()))
    }

    /// Judge `actual` output against `expected` output for `case`
    pub fn evaluate(
        &self,
        case: &TestCase,
        spec: &ProgramSpec,
        expected: &str,
        actual_text: &str,
    ) -> Result<CaseResult, TestError> {
        let mut expected_lines = split_lines(expected);
        let tag_ops = take_tag_line(&mut expected_lines);

        let ops: Vec<String> = spec.ops.iter().cloned().chain(tag_ops).collect();
        let expected = self.normalizer.apply(&expected_lines, &ops)?;
        let actual = self.normalizer.apply(&split_lines(actual_text), &ops)?;

        let comparison = self.comparator.compare_output(
            &expected,
            &actual,
            &self.display_path(&case.expected),
            &self.display_path(&case.actual),
        );

        let outcome = if !comparison.has_differences() {
            CaseOutcome::Passed
        } else if self.only_missing_final_newline(&expected, actual_text, &ops)? {
            CaseOutcome::MissingNewline
        } else {
            CaseOutcome::Failed
        };

        Ok(CaseResult {
            case: case.clone(),
            outcome,
            ops,
            input: String::new(),
            expected,
            actual,
            comparison,
            aux_files: Vec::new(),
            exit_code: None,
            duration: Duration::ZERO,
        })
    }

    /// True when `actual` lacks a final newline and adding one makes it
    /// match `expected`. Checked on the raw text, before any reordering.
    fn only_missing_final_newline(
        &self,
        expected: &[String],
        actual: &str,
        ops: &[String],
    ) -> Result<bool, TestError> {
        if actual.is_empty() || actual.ends_with('\n') {
            return Ok(false);
        }
        let terminated = split_lines(&format!("{}\n", actual));
        Ok(self.normalizer.apply(&terminated, ops)? == expected)
    }

    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root).unwrap_or(path).display().to_string()
    }
}

async fn read_text(path: &Path) -> Result<String, TestError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| TestError::Execution(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Split text into lines that keep their `\n`; `\r\n` counts as `\n`
pub fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n").split_inclusive('\n').map(str::to_string).collect()
}

/// Remove a leading tag line and return the operations it names
fn take_tag_line(lines: &mut Vec<String>) -> Vec<String> {
    let Some(rest) = lines.first().and_then(|first| first.strip_prefix(TAG_MARKER)) else {
        return Vec::new();
    };
    let ops = rest
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();
    lines.remove(0);
    ops
}

/// Whitespace-separated tokens of `input` that name existing files inside
/// `suite_dir`, either relative to `root` or to `suite_dir` itself
pub fn referenced_files(input: &str, root: &Path, suite_dir: &Path) -> Vec<PathBuf> {
    let Ok(suite_dir_canonical) = suite_dir.canonicalize() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for token in input.split_whitespace() {
        for candidate in [root.join(token), suite_dir.join(token)] {
            let Ok(canonical) = candidate.canonicalize() else {
                continue;
            };
            if canonical.is_file() && canonical.starts_with(&suite_dir_canonical) {
                if seen.insert(canonical) {
                    files.push(candidate);
                }
                break;
            }
        }
    }
    files
}
