//! Console reporting and run statistics

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use console::style;
use serde::{Deserialize, Serialize};

use crate::discovery::TestCase;
use crate::execution::{CaseOutcome, CaseResult};
use crate::fixtures::{Suite, SyncOutcome};
use crate::report::MISSING_NEWLINE_MESSAGE;

/// Outcome of one suite invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub suite: String,
    pub passed: usize,
    pub failed: usize,
    /// Stopped by an interrupt before every case ran
    pub interrupted: bool,
    /// Stopped by `--stop-on-failure`
    pub stopped_early: bool,
    pub report_path: PathBuf,
    pub duration: Duration,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    /// Check if all tests passed
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && !self.interrupted
    }

    /// Get success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.passed as f64 / self.total() as f64) * 100.0
        }
    }

    /// Print a summary to stdout
    pub fn print_summary(&self) {
        println!();
        println!();
        println!("{}", style("SUMMARY").bold());
        println!("  Total tests: {}", self.total());
        println!("  {} {}", style("Passed:").green(), style(self.passed).bold().green());
        if self.failed > 0 {
            println!("  {} {}", style("Failed:").red(), style(self.failed).bold().red());
        }
        if self.stopped_early {
            println!("  {}", style("Stopped after the first failure").yellow());
        }
        if self.interrupted {
            println!("  {}", style("Interrupted before all tests ran").yellow());
        }
        println!("  Duration: {:.2?}", self.duration);
        println!("  Report: {}", self.report_path.display());

        let line = format!("RESULT: {:.1}% success rate", self.success_rate());
        let styled = if self.all_passed() {
            style(line).bold().green()
        } else if self.success_rate() >= 90.0 {
            style(line).bold().yellow()
        } else {
            style(line).bold().red()
        };
        println!("{}", styled);
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test Results Summary for {}:", self.suite)?;
        writeln!(f, "  Total: {}", self.total())?;
        writeln!(f, "  Passed: {}", self.passed)?;
        writeln!(f, "  Failed: {}", self.failed)?;
        writeln!(f, "  Success Rate: {:.1}%", self.success_rate())?;
        writeln!(f, "  Duration: {:.2?}", self.duration)?;
        Ok(())
    }
}

/// Live progress output while cases run
#[derive(Debug, Clone, Copy)]
pub struct ConsoleReporter {
    quiet: bool,
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self { quiet, verbose }
    }

    pub fn suite_synced(&self, suite: &Suite, outcome: &SyncOutcome) {
        if self.quiet {
            return;
        }
        match outcome {
            SyncOutcome::Current { version } if self.verbose => {
                println!("{} is up to date (version {})", suite.dir.display(), version);
            }
            SyncOutcome::Current { .. } => {}
            SyncOutcome::Rebuilt { version, files } => {
                println!(
                    "Built {} with {} files (version {})",
                    suite.dir.display(),
                    files,
                    version
                );
            }
        }
    }

    pub fn no_cases(&self, program: &str) {
        if !self.quiet {
            println!("\n{}", style(format!("{}: no tests found", program)).yellow());
        }
    }

    pub fn case_started(&self, case: &TestCase) {
        if self.quiet {
            return;
        }
        print!("\n{}: Running test {}...", case.program, case.label);
        let _ = std::io::stdout().flush();
    }

    pub fn case_finished(&self, result: &CaseResult) {
        if self.quiet {
            return;
        }
        match result.outcome {
            CaseOutcome::Passed => print!("{}", style("PASSED").green()),
            CaseOutcome::MissingNewline => {
                println!("{}", style("FAILED").red());
                print!("{}", style(MISSING_NEWLINE_MESSAGE).yellow());
            }
            CaseOutcome::Failed => {
                println!("{}", style("FAILED").red());
                print_diff(result.comparison.diff());
            }
        }
        if self.verbose {
            if let Some(code) = result.exit_code {
                print!(" (exit code {}, {:.2?})", code, result.duration);
            }
        }
        let _ = std::io::stdout().flush();
    }

    pub fn interrupted(&self) {
        if !self.quiet {
            println!("\n{}", style("Interrupted!").bold().red());
        }
    }
}

fn print_diff(diff: &str) {
    for line in diff.lines() {
        let styled = if line.starts_with("+++") || line.starts_with("---") || line.starts_with("***") {
            style(line).dim()
        } else if line.starts_with('+') {
            style(line).green()
        } else if line.starts_with('-') {
            style(line).red()
        } else if line.starts_with('!') {
            style(line).yellow()
        } else {
            style(line).dim()
        };
        println!("{}", styled);
    }
}
