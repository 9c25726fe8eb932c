//! Main test harness orchestrating the test framework

use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::comparison::OutputComparator;
use crate::config::{ProgramSpec, SuiteTable, TestConfig};
use crate::discovery::TestDiscovery;
use crate::execution::{CaseRunner, Program};
use crate::fixtures::{FixtureSource, FixtureStore, HttpSource, Suite, SyncOutcome};
use crate::normalize::Normalizer;
use crate::report::ReportBuilder;
use crate::reporting::{ConsoleReporter, RunSummary};
use crate::TestError;

/// How the case loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    StoppedEarly,
    Interrupted,
}

/// Test harness for one suite invocation
pub struct SuiteHarness {
    config: TestConfig,
    root: PathBuf,
    suite: Suite,
    programs: Vec<ProgramSpec>,
    discovery: TestDiscovery,
    runner: CaseRunner,
    console: ConsoleReporter,
}

impl SuiteHarness {
    /// Create a harness using the suite table named by `config`
    pub fn new(config: TestConfig) -> Result<Self, TestError> {
        let table = config.suite_table()?;
        Self::with_table(config, &table)
    }

    /// Create a harness for `config` using `table`
    pub fn with_table(config: TestConfig, table: &SuiteTable) -> Result<Self, TestError> {
        config.validate()?;

        let normalizer = Normalizer::new();
        table.validate(&normalizer)?;

        let name = config.suite_name()?;
        let programs = select_programs(table.programs(&name)?, &config.programs)?;

        let root = config.root.canonicalize()?;
        let suite = Suite::new(&name, &config.url_root, &root);
        let comparator = OutputComparator::with_options(config.diff_style, config.context_lines);
        let runner = CaseRunner::new(&root, &suite.dir, normalizer, comparator);
        let console = ConsoleReporter::new(config.quiet, config.verbose);

        Ok(Self { config, root, suite, programs, discovery: TestDiscovery::new(), runner, console })
    }

    /// Get the test configuration
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn suite(&self) -> &Suite {
        &self.suite
    }

    /// Bring the suite's fixtures up to date from `source`
    pub async fn sync<S: FixtureSource>(&self, source: S) -> Result<SyncOutcome, TestError> {
        let store = FixtureStore::new(source)?.with_progress(!self.config.quiet);
        let outcome = store.ensure_current(&self.suite).await?;
        self.console.suite_synced(&self.suite, &outcome);
        Ok(outcome)
    }

    /// Sync over HTTP (unless offline) and run every case, stopping cleanly on Ctrl-C
    pub async fn run(&self) -> Result<RunSummary, TestError> {
        if self.config.offline {
            if !self.suite.dir.is_dir() {
                return Err(TestError::Discovery(format!(
                    "{} does not exist; run once without --offline to fetch it",
                    self.suite.dir.display()
                )));
            }
        } else {
            self.sync(HttpSource::new()).await?;
        }

        self.run_cases(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run every case of every selected program. When `interrupt` completes
    /// the running case is abandoned and the report is closed as incomplete.
    pub async fn run_cases<F>(&self, interrupt: F) -> Result<RunSummary, TestError>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();

        let interpreter = self.config.interpreter_command()?;
        let programs = self
            .programs
            .iter()
            .map(|spec| Program::resolve(&self.root, spec, interpreter.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = ReportBuilder::open(self.config.report_path(&self.suite.name), &self.suite.name)?
            .with_root(&self.root)
            .with_embed_limit(self.config.embed_limit);

        tokio::pin!(interrupt);
        let mut status = RunStatus::Completed;

        'programs: for program in &programs {
            let cases = self.discovery.discover(&self.suite.dir, program.spec.id())?;
            if cases.is_empty() {
                self.console.no_cases(program.spec.id());
            }

            for case in &cases {
                self.console.case_started(case);

                let result = tokio::select! {
                    biased;
                    _ = &mut interrupt => None,
                    result = self.runner.run(case, program) => Some(result),
                };
                let Some(result) = result else {
                    status = RunStatus::Interrupted;
                    break 'programs;
                };
                let result = result?;

                self.console.case_finished(&result);
                let passed = result.passed();
                report.record(result)?;

                if !passed && self.config.stop_on_failure {
                    status = RunStatus::StoppedEarly;
                    break 'programs;
                }
            }
        }

        // An interrupt that lands after the last case still counts
        if status != RunStatus::Interrupted {
            tokio::select! {
                biased;
                _ = &mut interrupt => status = RunStatus::Interrupted,
                _ = std::future::ready(()) => {}
            }
        }

        if status == RunStatus::Interrupted {
            self.console.interrupted();
            report.mark_interrupted();
        }
        let report = report.finish()?;
        info!("{}: {:?}, report at {}", self.suite.name, status, report.path.display());

        Ok(RunSummary {
            suite: self.suite.name.clone(),
            passed: report.passed,
            failed: report.failed,
            interrupted: status == RunStatus::Interrupted,
            stopped_early: status == RunStatus::StoppedEarly,
            report_path: report.path,
            duration: start_time.elapsed(),
        })
    }
}

/// Restrict `programs` to the requested files, keeping suite order
fn select_programs(programs: &[ProgramSpec], requested: &[String]) -> Result<Vec<ProgramSpec>, TestError> {
    if requested.is_empty() {
        return Ok(programs.to_vec());
    }

    for name in requested {
        if !programs.iter().any(|p| &p.file == name || p.id() == name) {
            return Err(TestError::Config(format!("Program '{}' is not part of this suite", name)));
        }
    }

    Ok(programs
        .iter()
        .filter(|p| requested.iter().any(|name| &p.file == name || p.id() == name))
        .cloned()
        .collect())
}
