//! Main binary for running fixture tests

use clap::Parser;
use std::io;
use std::process;

use console::style;
use fixture_tester::{authoring, config::TestConfig, harness::SuiteHarness, VERSION};

/// Exit status after an interrupt, as a shell reports SIGINT
const INTERRUPTED_EXIT: i32 = 130;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = match TestConfig::try_parse() {
        Ok(config) => config,
        Err(e) if e.use_stderr() => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
        Err(e) => e.exit(),
    };

    let default_level = if config.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Some(command) = &config.command {
        if let Err(e) = authoring::run(command, io::stdin().lock()) {
            eprintln!("{}", e);
            process::exit(1);
        }
        return;
    }

    let harness = match SuiteHarness::new(config) {
        Ok(harness) => harness,
        Err(e) => {
            eprintln!("Failed to create test harness: {}", e);
            process::exit(1);
        }
    };

    if !harness.config().quiet {
        println!("{}", style(format!("fixture-tester, version {}", VERSION)).bold());
    }

    match harness.run().await {
        Ok(summary) => {
            if !harness.config().quiet {
                summary.print_summary();
            }

            if summary.interrupted {
                process::exit(INTERRUPTED_EXIT);
            }
            if !summary.all_passed() {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}", style(format!("Test execution failed: {}", e)).red());
            process::exit(1);
        }
    }
}
