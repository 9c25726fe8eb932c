//! Configuration and settings for the test framework

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::comparison::DiffStyle;
use crate::normalize::Normalizer;
use crate::TestError;

/// Where fixtures are published unless overridden
pub const DEFAULT_URL_ROOT: &str = "http://www2.cs.arizona.edu/~whm/120/";

/// Default character budget for auxiliary files embedded in the report
pub const DEFAULT_EMBED_LIMIT: usize = 2000;

/// Configuration for the test framework
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "fixture-tester", version)]
#[command(about = "Run programs against synchronized example fixtures and report differences")]
#[command(args_conflicts_with_subcommands = true)]
pub struct TestConfig {
    /// Suite to test (defaults to the executable name prefix, e.g. `a5` for `a5-tester`)
    pub suite: Option<String>,

    /// Root URL the suites are published under
    #[arg(long, env = "FIXTURE_URL_ROOT", default_value = DEFAULT_URL_ROOT)]
    pub url_root: String,

    /// Directory containing the programs and the fixture directories
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// JSON file with the suite table, replacing the built-in one
    #[arg(long)]
    pub suites: Option<PathBuf>,

    /// Only test these program files
    #[arg(long = "program")]
    pub programs: Vec<String>,

    /// Stop after the first failing case
    #[arg(short = 'x', long)]
    pub stop_on_failure: bool,

    /// Textual diff style
    #[arg(long, value_enum, default_value_t = DiffStyle::Context)]
    pub diff_style: DiffStyle,

    /// Context lines shown around each textual difference
    #[arg(long, default_value_t = 3)]
    pub context_lines: usize,

    /// Where to write the HTML report (default: `test-{suite}-report.html` under the root)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Characters of each referenced file embedded in the report
    #[arg(long, default_value_t = DEFAULT_EMBED_LIMIT)]
    pub embed_limit: usize,

    /// Command used to launch programs, e.g. "python3 -u"
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Use the local fixtures as they are, without contacting the server
    #[arg(long)]
    pub offline: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Maintenance commands
    #[command(subcommand)]
    #[serde(skip)]
    pub command: Option<Command>,
}

/// Suite maintenance commands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Generate numbered input files (and empty expected files) from stdin
    Generate(GenerateArgs),
    /// Rename a program's actual outputs to expected outputs
    Promote(PromoteArgs),
}

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    /// Suite whose fixture directory receives the files
    pub suite: String,
    /// Program the inputs are for (extension is ignored)
    pub program: String,
    /// Line descriptors, cycled: `f` = file name under the fixture directory, `l` = literal line
    pub descriptors: String,
    /// Directory containing the fixture directories
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct PromoteArgs {
    /// Suite whose fixture directory is updated
    pub suite: String,
    /// Program whose actual outputs are promoted (extension is ignored)
    pub program: String,
    /// Directory containing the fixture directories
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

impl TestConfig {
    /// Create a new configuration with sensible defaults
    pub fn new(suite: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            suite: Some(suite.into()),
            url_root: DEFAULT_URL_ROOT.to_string(),
            root: root.into(),
            suites: None,
            programs: Vec::new(),
            stop_on_failure: false,
            diff_style: DiffStyle::Context,
            context_lines: 3,
            report: None,
            embed_limit: DEFAULT_EMBED_LIMIT,
            interpreter: None,
            offline: false,
            verbose: false,
            quiet: false,
            command: None,
        }
    }

    /// The suite name, falling back to the prefix of the executable name
    pub fn suite_name(&self) -> Result<String, TestError> {
        if let Some(suite) = &self.suite {
            return Ok(suite.clone());
        }

        let argv0 = std::env::args().next().unwrap_or_default();
        suite_from_executable(&argv0).ok_or_else(|| {
            TestError::Config(format!(
                "Can't figure out the suite for a tester named '{}'; pass it as an argument",
                argv0
            ))
        })
    }

    /// Split the interpreter option into program and arguments
    pub fn interpreter_command(&self) -> Result<Option<Vec<String>>, TestError> {
        let Some(interpreter) = &self.interpreter else {
            return Ok(None);
        };
        match shlex::split(interpreter) {
            Some(parts) if !parts.is_empty() => Ok(Some(parts)),
            _ => Err(TestError::Config(format!("Invalid interpreter command: '{}'", interpreter))),
        }
    }

    /// Report location for `suite`
    pub fn report_path(&self, suite: &str) -> PathBuf {
        self.report
            .clone()
            .unwrap_or_else(|| self.root.join(format!("test-{}-report.html", suite)))
    }

    /// Load the suite table this configuration points at
    pub fn suite_table(&self) -> Result<SuiteTable, TestError> {
        match &self.suites {
            Some(path) => SuiteTable::from_file(path),
            None => Ok(SuiteTable::builtin()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TestError> {
        if !self.root.is_dir() {
            return Err(TestError::Config(format!(
                "Root path not found or not a directory: {}",
                self.root.display()
            )));
        }

        if self.programs.iter().any(String::is_empty) {
            return Err(TestError::Config("Empty program name".to_string()));
        }

        self.interpreter_command()?;
        Ok(())
    }
}

/// `a5-tester` → `a5`, `/usr/bin/a5-tester.exe` → `a5`
fn suite_from_executable(argv0: &str) -> Option<String> {
    let stem = Path::new(argv0).file_stem()?.to_str()?;
    if stem == "fixture-tester" {
        return None;
    }
    let (prefix, _) = stem.split_once('-')?;
    (!prefix.is_empty()).then(|| prefix.to_string())
}

/// A program under test and the normalization it needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSpec {
    /// Program file name, e.g. `ngrams.py`
    pub file: String,
    /// Normalization operations applied to expected and actual output
    #[serde(default)]
    pub ops: Vec<String>,
}

impl ProgramSpec {
    pub fn new(file: &str, ops: &[&str]) -> Self {
        Self { file: file.to_string(), ops: ops.iter().map(|op| op.to_string()).collect() }
    }

    /// File name without its extension; fixtures are named after it
    pub fn id(&self) -> &str {
        match self.file.split_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.file,
        }
    }

    /// Extension of the program file, if any
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.file).extension().and_then(|ext| ext.to_str())
    }
}

/// Immutable mapping from suite name to its programs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuiteTable {
    suites: BTreeMap<String, Vec<ProgramSpec>>,
}

impl SuiteTable {
    /// The suites the tester ships with
    pub fn builtin() -> Self {
        let mut suites = BTreeMap::new();
        suites.insert("a3".to_string(), vec![ProgramSpec::new("rhymes.py", &[])]);
        suites.insert(
            "a4".to_string(),
            vec![ProgramSpec::new("abundance.py", &[]), ProgramSpec::new("biodiversity.py", &[])],
        );
        suites.insert(
            "a5".to_string(),
            vec![ProgramSpec::new("ngrams.py", &["sort"]), ProgramSpec::new("bball.py", &["sort"])],
        );
        suites.insert("ver".to_string(), vec![ProgramSpec::new("version.py", &[])]);
        Self { suites }
    }

    /// Parse a JSON table: `{"a5": [{"file": "ngrams.py", "ops": ["sort"]}]}`
    pub fn from_json(json: &str) -> Result<Self, TestError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON table from disk
    pub fn from_file(path: &Path) -> Result<Self, TestError> {
        let json = fs::read_to_string(path).map_err(|e| {
            TestError::Config(format!("Failed to read suite table {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Programs of `suite`
    pub fn programs(&self, suite: &str) -> Result<&[ProgramSpec], TestError> {
        self.suites
            .get(suite)
            .map(Vec::as_slice)
            .ok_or_else(|| TestError::UnknownSuite(suite.to_string()))
    }

    /// Suite names, sorted
    pub fn suite_names(&self) -> impl Iterator<Item = &str> {
        self.suites.keys().map(String::as_str)
    }

    /// Check every program's operations against `normalizer`
    pub fn validate(&self, normalizer: &Normalizer) -> Result<(), TestError> {
        for programs in self.suites.values() {
            for program in programs {
                normalizer.validate(&program.ops)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let table = SuiteTable::builtin();
        let a5 = table.programs("a5").unwrap();
        assert_eq!(a5.len(), 2);
        assert_eq!(a5[0].id(), "ngrams");
        assert_eq!(a5[0].ops, vec!["sort".to_string()]);
        assert!(table.validate(&Normalizer::new()).is_ok());
        assert_eq!(table.suite_names().collect::<Vec<_>>(), vec!["a3", "a4", "a5", "ver"]);
    }

    #[test]
    fn test_unknown_suite() {
        let err = SuiteTable::builtin().programs("a99").unwrap_err();
        assert!(matches!(err, TestError::UnknownSuite(ref name) if name == "a99"));
    }

    #[test]
    fn test_table_from_json() {
        let table = SuiteTable::from_json(
            r#"{"a9": [{"file": "friends.py", "ops": ["sort", "uniq"]}, {"file": "street.py"}]}"#,
        )
        .unwrap();
        let programs = table.programs("a9").unwrap();
        assert_eq!(programs[0], ProgramSpec::new("friends.py", &["sort", "uniq"]));
        assert!(programs[1].ops.is_empty());
    }

    #[test]
    fn test_table_with_unknown_op_fails_validation() {
        let table = SuiteTable::from_json(r#"{"s": [{"file": "p.py", "ops": ["shuffle"]}]}"#).unwrap();
        let err = table.validate(&Normalizer::new()).unwrap_err();
        assert!(err.to_string().contains("shuffle"));
    }

    #[test]
    fn test_program_id() {
        assert_eq!(ProgramSpec::new("rhymes.py", &[]).id(), "rhymes");
        assert_eq!(ProgramSpec::new("echo-like.sh", &[]).id(), "echo-like");
        assert_eq!(ProgramSpec::new("plain", &[]).id(), "plain");
        assert_eq!(ProgramSpec::new("rhymes.py", &[]).extension(), Some("py"));
    }

    #[test]
    fn test_suite_from_executable() {
        assert_eq!(suite_from_executable("a5-tester"), Some("a5".to_string()));
        assert_eq!(suite_from_executable("/home/me/bin/a12-tester.exe"), Some("a12".to_string()));
        assert_eq!(suite_from_executable("fixture_tester"), None);
        assert_eq!(suite_from_executable("target/debug/fixture-tester"), None);
    }

    #[test]
    fn test_cli_parsing() {
        let config = TestConfig::try_parse_from([
            "fixture-tester",
            "a5",
            "--diff-style",
            "unified",
            "-x",
            "--program",
            "ngrams.py",
        ])
        .unwrap();
        assert_eq!(config.suite.as_deref(), Some("a5"));
        assert_eq!(config.diff_style, DiffStyle::Unified);
        assert!(config.stop_on_failure);
        assert_eq!(config.programs, vec!["ngrams.py".to_string()]);
        assert_eq!(config.report_path("a5"), PathBuf::from("./test-a5-report.html"));
    }

    #[test]
    fn test_interpreter_command() {
        let mut config = TestConfig::new("a5", ".");
        assert_eq!(config.interpreter_command().unwrap(), None);
        config.interpreter = Some("python3 -u".to_string());
        assert_eq!(
            config.interpreter_command().unwrap(),
            Some(vec!["python3".to_string(), "-u".to_string()])
        );
        config.interpreter = Some("\"unterminated".to_string());
        assert!(config.validate().is_err());
    }
}
