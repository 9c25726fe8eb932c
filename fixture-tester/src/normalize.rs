//! Output normalization applied before comparison
//!
//! A program's output is compared line by line, but some assignments only
//! care about the set of lines printed, or about blocks whose internal order
//! is free. Each such relaxation is a named transform; a program lists the
//! transforms it needs and the same list is applied to both the expected and
//! the actual lines.

use std::collections::BTreeMap;

use crate::TestError;

/// A pure line-sequence transform
pub type Transform = fn(Vec<String>) -> Vec<String>;

/// Registry of normalization operations keyed by name
#[derive(Debug, Clone)]
pub struct Normalizer {
    operations: BTreeMap<String, Transform>,
}

impl Normalizer {
    /// Create a normalizer with the built-in operations
    pub fn new() -> Self {
        let mut normalizer = Self { operations: BTreeMap::new() };
        normalizer.register("sort", sort);
        normalizer.register("uniq", uniq);
        normalizer.register("upper", upper);
        normalizer.register("lower", lower);
        normalizer.register("rstrip", rstrip);
        normalizer.register("sort-runs", sort_runs);
        normalizer.register("sort-paragraphs", sort_paragraphs);
        normalizer
    }

    /// Register (or replace) an operation
    pub fn register(&mut self, name: &str, transform: Transform) {
        self.operations.insert(name.to_string(), transform);
    }

    /// Names of all registered operations, sorted
    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    /// Check that every name in `ops` is known
    pub fn validate<S: AsRef<str>>(&self, ops: &[S]) -> Result<(), TestError> {
        for op in ops {
            self.lookup(op.as_ref())?;
        }
        Ok(())
    }

    /// Apply `ops` to `lines` in order
    pub fn apply<S: AsRef<str>>(&self, lines: &[String], ops: &[S]) -> Result<Vec<String>, TestError> {
        let mut result = lines.to_vec();
        for op in ops {
            let transform = self.lookup(op.as_ref())?;
            result = transform(result);
        }
        Ok(result)
    }

    fn lookup(&self, name: &str) -> Result<Transform, TestError> {
        self.operations
            .get(name)
            .copied()
            .ok_or_else(|| TestError::UnknownOperation(name.to_string()))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn sort(mut lines: Vec<String>) -> Vec<String> {
    lines.sort();
    lines
}

fn uniq(mut lines: Vec<String>) -> Vec<String> {
    lines.dedup();
    lines
}

fn upper(lines: Vec<String>) -> Vec<String> {
    lines.into_iter().map(|line| line.to_uppercase()).collect()
}

fn lower(lines: Vec<String>) -> Vec<String> {
    lines.into_iter().map(|line| line.to_lowercase()).collect()
}

/// Drop spaces and tabs in front of the line terminator.
fn rstrip(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| {
            let (body, terminator) = split_terminator(&line);
            format!("{}{}", body.trim_end_matches([' ', '\t']), terminator)
        })
        .collect()
}

/// Sort each run of adjacent lines that share the numeric value of their
/// last token. Lines whose last token is not an integer share the sentinel
/// key `None`; runs are never moved relative to each other.
fn sort_runs(lines: Vec<String>) -> Vec<String> {
    reorder_groups(lines, |previous, line| trailing_key(previous) == trailing_key(line))
}

/// Sort the lines of each blank-line separated paragraph. Blank lines stay
/// where they are.
fn sort_paragraphs(lines: Vec<String>) -> Vec<String> {
    reorder_groups(lines, |previous, line| is_blank(previous) == is_blank(line))
}

fn reorder_groups(lines: Vec<String>, same_group: impl Fn(&str, &str) -> bool) -> Vec<String> {
    let mut result = Vec::with_capacity(lines.len());
    let mut group: Vec<String> = Vec::new();

    for line in lines {
        if let Some(previous) = group.last() {
            if !same_group(previous, &line) {
                group.sort();
                result.append(&mut group);
            }
        }
        group.push(line);
    }
    group.sort();
    result.append(&mut group);

    result
}

fn trailing_key(line: &str) -> Option<i64> {
    line.split_whitespace().last().and_then(|token| token.parse().ok())
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}
