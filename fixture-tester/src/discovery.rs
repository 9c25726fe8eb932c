//! Test discovery functionality

use std::path::{Path, PathBuf};

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::TestError;

/// One numbered input/expected pair for a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Program identifier (file name without extension)
    pub program: String,
    /// Case number, used for ordering
    pub number: u32,
    /// Case number as spelled in the file names, e.g. `01`
    pub label: String,
    /// Input bound to the program's standard input
    pub input: PathBuf,
    /// Expected output
    pub expected: PathBuf,
    /// Where the program's output is captured
    pub actual: PathBuf,
}

impl TestCase {
    /// Build the case `label` of `program` inside `dir`
    pub fn new(dir: &Path, program: &str, label: &str) -> Result<Self, TestError> {
        let number = label.parse().map_err(|e| {
            TestError::Discovery(format!("Bad case number '{}' for {}: {}", label, program, e))
        })?;
        let file = |kind: &str| dir.join(format!("{}-{}-{}.txt", program, kind, label));
        Ok(Self {
            program: program.to_string(),
            number,
            label: label.to_string(),
            input: file("input"),
            expected: file("expected"),
            actual: file("actual"),
        })
    }

    /// `program-NN`, for log and console messages
    pub fn name(&self) -> String {
        format!("{}-{}", self.program, self.label)
    }
}

/// Test discovery engine
#[derive(Debug, Default, Clone, Copy)]
pub struct TestDiscovery;

impl TestDiscovery {
    pub fn new() -> Self {
        Self
    }

    /// Find the cases of `program` in `dir`, in numeric order
    pub fn discover(&self, dir: &Path, program: &str) -> Result<Vec<TestCase>, TestError> {
        if !dir.is_dir() {
            return Err(TestError::Discovery(format!(
                "Test directory not found: {}",
                dir.display()
            )));
        }

        let pattern = Regex::new(&format!(r"^{}-input-([0-9]+)\.txt$", regex::escape(program)))
            .map_err(|e| TestError::Discovery(format!("Invalid program name '{}': {}", program, e)))?;

        let mut cases = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                TestError::Discovery(format!("Failed to read {}: {}", dir.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            if let Some(captures) = pattern.captures(file_name) {
                cases.push(TestCase::new(dir, program, &captures[1])?);
            }
        }

        cases.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.label.cmp(&b.label)));
        debug!("Found {} cases for {} in {}", cases.len(), program, dir.display());

        Ok(cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn test_numeric_order() {
        let dir = TempDir::new().unwrap();
        for n in ["9", "10", "2"] {
            touch(dir.path(), &format!("bball-input-{}.txt", n));
        }

        let cases = TestDiscovery::new().discover(dir.path(), "bball").unwrap();
        let labels: Vec<_> = cases.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["2", "9", "10"]);
    }

    #[test]
    fn test_only_matching_program() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "ngrams-input-01.txt");
        touch(dir.path(), "ngrams-expected-01.txt");
        touch(dir.path(), "ngrams-actual-01.txt");
        touch(dir.path(), "xngrams-input-02.txt");
        touch(dir.path(), "ngrams-input-x.txt");
        touch(dir.path(), "ngrams-input-03.txt.bak");
        fs::create_dir(dir.path().join("ngrams-input-04.txt")).unwrap();

        let cases = TestDiscovery::new().discover(dir.path(), "ngrams").unwrap();
        assert_eq!(cases.len(), 1);
        let case = &cases[0];
        assert_eq!(case.number, 1);
        assert_eq!(case.label, "01");
        assert_eq!(case.input, dir.path().join("ngrams-input-01.txt"));
        assert_eq!(case.expected, dir.path().join("ngrams-expected-01.txt"));
        assert_eq!(case.actual, dir.path().join("ngrams-actual-01.txt"));
        assert_eq!(case.name(), "ngrams-01");
    }

    #[test]
    fn test_program_names_are_literal() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a+b-input-1.txt");
        touch(dir.path(), "aab-input-2.txt");

        let cases = TestDiscovery::new().discover(dir.path(), "a+b").unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].number, 1);
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let result = TestDiscovery::new().discover(&dir.path().join("nope"), "p");
        assert!(matches!(result, Err(TestError::Discovery(_))));
    }
}
