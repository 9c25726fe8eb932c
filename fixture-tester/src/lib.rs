//! # Fixture Tester
//!
//! A test harness that keeps a local copy of an assignment's example
//! inputs and expected outputs in sync with a remote, versioned source,
//! runs a program against every input and compares what it printed with
//! what was expected.
//!
//! ## Architecture
//!
//! The framework is organized into several modules:
//! - `fixtures`: Remote fixture synchronization (the `test-{suite}` cache)
//! - `normalize`: Named line transforms applied before comparison
//! - `discovery`: Test case discovery inside a fixture directory
//! - `execution`: Running a program against a single case
//! - `comparison`: Line diffs in textual and tabular form
//! - `report`: The self-contained HTML diff report
//! - `reporting`: Console output and run statistics
//! - `harness`: Drives one suite invocation end to end
//! - `config`: Command-line configuration and the suite table
//! - `authoring`: Helpers for suite maintainers (input generation, promotion)

pub mod authoring;
pub mod comparison;
pub mod config;
pub mod discovery;
pub mod execution;
pub mod fixtures;
pub mod harness;
pub mod normalize;
pub mod report;
pub mod reporting;

// Re-exports for easier access
pub use comparison::{DiffStyle, OutputComparator, OutputComparison};
pub use config::{ProgramSpec, SuiteTable, TestConfig};
pub use discovery::{TestCase, TestDiscovery};
pub use execution::{CaseOutcome, CaseResult, CaseRunner};
pub use fixtures::{FixtureSource, FixtureStore, HttpSource, Suite, SyncOutcome};
pub use harness::{RunStatus, SuiteHarness};
pub use normalize::Normalizer;
pub use report::ReportBuilder;
pub use reporting::RunSummary;

/// Current version of the test framework
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Test framework errors
#[derive(thiserror::Error, Debug)]
pub enum TestError {
    #[error("Could not fetch '{url}': {message}")]
    Transport { url: String, message: String },

    #[error(
        "The tester needs to create a directory named '{0}' but something that is not a \
         directory already has that name. Remove it or rename it and run again."
    )]
    Conflict(std::path::PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown normalization operation '{0}'")]
    UnknownOperation(String),

    #[error("Unknown suite '{0}'")]
    UnknownSuite(String),

    #[error("Program not found: {0}")]
    ProgramNotFound(std::path::PathBuf),

    #[error("Test discovery failed: {0}")]
    Discovery(String),

    #[error("Test execution failed: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Suite table error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] indicatif::style::TemplateError),
}
