//! Output comparison and diff generation functionality

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, DiffOp, TextDiff};

/// Textual diff flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum DiffStyle {
    /// `*** / ---` context diff
    #[default]
    Context,
    /// `@@` unified diff
    Unified,
}

/// Kind of a row in the side-by-side diff table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowKind {
    Equal,
    Changed,
    Deleted,
    Added,
}

/// One row of the side-by-side diff table. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRow {
    pub kind: RowKind,
    pub expected: Option<(usize, String)>,
    pub actual: Option<(usize, String)>,
}

/// Represents the result of comparing expected vs actual output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputComparison {
    /// Whether there are differences between expected and actual output
    pub has_differences: bool,
    /// Textual diff (empty if no differences)
    pub diff: String,
    /// Side-by-side rows covering every line of both sides
    pub rows: Vec<DiffRow>,
    /// Number of added lines
    pub added_lines: usize,
    /// Number of removed lines
    pub removed_lines: usize,
}

impl OutputComparison {
    /// Check if this comparison has differences
    pub fn has_differences(&self) -> bool {
        self.has_differences
    }

    /// Get the diff string
    pub fn diff(&self) -> &str {
        &self.diff
    }
}

/// Output comparison engine
#[derive(Debug, Clone)]
pub struct OutputComparator {
    style: DiffStyle,
    context_lines: usize,
}

impl OutputComparator {
    /// Create a new output comparator with default settings
    pub fn new() -> Self {
        Self { style: DiffStyle::Context, context_lines: 3 }
    }

    /// Create a comparator with custom settings
    pub fn with_options(style: DiffStyle, context_lines: usize) -> Self {
        Self { style, context_lines }
    }

    /// Compare expected lines with actual lines. Lines keep their
    /// terminators; `expected_name` and `actual_name` label the diff header.
    pub fn compare_output(
        &self,
        expected: &[String],
        actual: &[String],
        expected_name: &str,
        actual_name: &str,
    ) -> OutputComparison {
        let old: Vec<&str> = expected.iter().map(String::as_str).collect();
        let new: Vec<&str> = actual.iter().map(String::as_str).collect();
        let diff = TextDiff::from_slices(&old, &new);

        let rows = side_by_side_rows(&diff);
        let added_lines = rows.iter().filter(|r| r.actual.is_some() && r.kind != RowKind::Equal).count();
        let removed_lines =
            rows.iter().filter(|r| r.expected.is_some() && r.kind != RowKind::Equal).count();

        if expected == actual {
            return OutputComparison {
                has_differences: false,
                diff: String::new(),
                rows,
                added_lines: 0,
                removed_lines: 0,
            };
        }

        let text = match self.style {
            DiffStyle::Unified => self.unified_diff(&diff, expected_name, actual_name),
            DiffStyle::Context => self.context_diff(&diff, expected_name, actual_name),
        };

        OutputComparison { has_differences: true, diff: text, rows, added_lines, removed_lines }
    }

    /// Generate a unified diff between expected and actual lines
    fn unified_diff<'a>(
        &self,
        diff: &TextDiff<'a, 'a, 'a, str>,
        expected_name: &str,
        actual_name: &str,
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!("--- {}\n", expected_name));
        output.push_str(&format!("+++ {}\n", actual_name));

        for group in diff.grouped_ops(self.context_lines) {
            let (old_range, new_range) = group_ranges(&group);
            output.push_str(&format!(
                "@@ -{} +{} @@\n",
                unified_range(old_range.0, old_range.1),
                unified_range(new_range.0, new_range.1),
            ));

            for op in &group {
                for change in diff.iter_changes(op) {
                    let prefix = match change.tag() {
                        ChangeTag::Delete => "-",
                        ChangeTag::Insert => "+",
                        ChangeTag::Equal => " ",
                    };
                    push_line(&mut output, prefix, change.value());
                }
            }
        }

        output
    }

    /// Generate a context diff between expected and actual lines
    fn context_diff<'a>(
        &self,
        diff: &TextDiff<'a, 'a, 'a, str>,
        expected_name: &str,
        actual_name: &str,
    ) -> String {
        let old = diff.old_slices();
        let new = diff.new_slices();

        let mut output = String::new();
        output.push_str(&format!("*** {}\n", expected_name));
        output.push_str(&format!("--- {}\n", actual_name));

        for group in diff.grouped_ops(self.context_lines) {
            let (old_range, new_range) = group_ranges(&group);
            output.push_str("***************\n");

            output.push_str(&format!("*** {} ****\n", context_range(old_range.0, old_range.1)));
            if group.iter().any(|op| matches!(op, DiffOp::Delete { .. } | DiffOp::Replace { .. })) {
                for op in &group {
                    let prefix = match op {
                        DiffOp::Insert { .. } => continue,
                        DiffOp::Equal { .. } => "  ",
                        DiffOp::Delete { .. } => "- ",
                        DiffOp::Replace { .. } => "! ",
                    };
                    for line in &old[op.old_range()] {
                        push_line(&mut output, prefix, line);
                    }
                }
            }

            output.push_str(&format!("--- {} ----\n", context_range(new_range.0, new_range.1)));
            if group.iter().any(|op| matches!(op, DiffOp::Insert { .. } | DiffOp::Replace { .. })) {
                for op in &group {
                    let prefix = match op {
                        DiffOp::Delete { .. } => continue,
                        DiffOp::Equal { .. } => "  ",
                        DiffOp::Insert { .. } => "+ ",
                        DiffOp::Replace { .. } => "! ",
                    };
                    for line in &new[op.new_range()] {
                        push_line(&mut output, prefix, line);
                    }
                }
            }
        }

        output
    }
}

impl Default for OutputComparator {
    fn default() -> Self {
        Self::new()
    }
}

fn side_by_side_rows<'a>(diff: &TextDiff<'a, 'a, 'a, str>) -> Vec<DiffRow> {
    let old = diff.old_slices();
    let new = diff.new_slices();
    let numbered = |lines: &[&str], index: usize| (index + 1, lines[index].to_string());

    let mut rows = Vec::new();
    for op in diff.ops() {
        let old_range = op.old_range();
        let new_range = op.new_range();
        match op {
            DiffOp::Equal { .. } => {
                for (o, n) in old_range.zip(new_range) {
                    rows.push(DiffRow {
                        kind: RowKind::Equal,
                        expected: Some(numbered(old, o)),
                        actual: Some(numbered(new, n)),
                    });
                }
            }
            DiffOp::Delete { .. } => {
                for o in old_range {
                    rows.push(DiffRow { kind: RowKind::Deleted, expected: Some(numbered(old, o)), actual: None });
                }
            }
            DiffOp::Insert { .. } => {
                for n in new_range {
                    rows.push(DiffRow { kind: RowKind::Added, expected: None, actual: Some(numbered(new, n)) });
                }
            }
            DiffOp::Replace { .. } => {
                let width = old_range.len().max(new_range.len());
                for i in 0..width {
                    let o = old_range.start + i;
                    let n = new_range.start + i;
                    rows.push(DiffRow {
                        kind: RowKind::Changed,
                        expected: old_range.contains(&o).then(|| numbered(old, o)),
                        actual: new_range.contains(&n).then(|| numbered(new, n)),
                    });
                }
            }
        }
    }
    rows
}

type Span = (usize, usize);

fn group_ranges(group: &[DiffOp]) -> (Span, Span) {
    match (group.first(), group.last()) {
        (Some(first), Some(last)) => (
            (first.old_range().start, last.old_range().end),
            (first.new_range().start, last.new_range().end),
        ),
        _ => ((0, 0), (0, 0)),
    }
}

fn unified_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    let beginning = if length == 0 { start } else { start + 1 };
    if length == 1 {
        format!("{}", beginning)
    } else {
        format!("{},{}", beginning, length)
    }
}

fn context_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    let beginning = if length == 0 { start } else { start + 1 };
    if length <= 1 {
        format!("{}", beginning)
    } else {
        format!("{},{}", beginning, beginning + length - 1)
    }
}

fn push_line(output: &mut String, prefix: &str, line: &str) {
    output.push_str(prefix);
    output.push_str(line);
    if !line.ends_with('\n') {
        output.push_str("\n\\ No newline at end of file\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_differences() {
        let comparator = OutputComparator::new();
        let expected = lines(&["line1\n", "line2\n"]);
        let result = comparator.compare_output(&expected, &expected, "e", "a");
        assert!(!result.has_differences());
        assert!(result.diff().is_empty());
        assert_eq!(result.rows.len(), 2);
        assert!(result.rows.iter().all(|r| r.kind == RowKind::Equal));
    }

    #[test]
    fn test_unified_diff() {
        let comparator = OutputComparator::with_options(DiffStyle::Unified, 3);
        let expected = lines(&["line1\n", "line2\n"]);
        let actual = lines(&["line1\n", "different\n"]);

        let result = comparator.compare_output(&expected, &actual, "exp.txt", "act.txt");
        assert!(result.has_differences());
        assert_eq!(
            result.diff(),
            "--- exp.txt\n+++ act.txt\n@@ -1,2 +1,2 @@\n line1\n-line2\n+different\n"
        );
        assert_eq!(result.added_lines, 1);
        assert_eq!(result.removed_lines, 1);
    }

    #[test]
    fn test_context_diff() {
        let comparator = OutputComparator::new();
        let expected = lines(&["a\n", "b\n", "c\n"]);
        let actual = lines(&["a\n", "B\n", "c\n", "d\n"]);

        let result = comparator.compare_output(&expected, &actual, "exp.txt", "act.txt");
        assert_eq!(
            result.diff(),
            "*** exp.txt\n--- act.txt\n***************\n*** 1,3 ****\n  a\n! b\n  c\n\
             --- 1,4 ----\n  a\n! B\n  c\n+ d\n"
        );
    }

    #[test]
    fn test_context_diff_insert_only_omits_old_body() {
        let comparator = OutputComparator::new();
        let result = comparator.compare_output(&lines(&["a\n"]), &lines(&["a\n", "b\n"]), "e", "a");
        assert_eq!(result.diff(), "*** e\n--- a\n***************\n*** 1 ****\n--- 1,2 ----\n  a\n+ b\n");
    }

    #[test]
    fn test_diff_style_does_not_change_outcome() {
        let expected = lines(&["x\n", "y\n"]);
        let actual = lines(&["y\n", "x\n"]);
        for style in [DiffStyle::Context, DiffStyle::Unified] {
            let comparator = OutputComparator::with_options(style, 1);
            assert!(comparator.compare_output(&expected, &actual, "e", "a").has_differences());
            assert!(!comparator.compare_output(&expected, &expected, "e", "a").has_differences());
        }
    }

    #[test]
    fn test_replace_rows_pair_lines() {
        let comparator = OutputComparator::new();
        let result = comparator.compare_output(&lines(&["a\n", "b\n"]), &lines(&["c\n"]), "e", "a");
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].kind, RowKind::Changed);
        assert_eq!(result.rows[0].expected, Some((1, "a\n".to_string())));
        assert_eq!(result.rows[0].actual, Some((1, "c\n".to_string())));
        assert_eq!(result.rows[1].actual, None);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(unified_range(0, 0), "0,0");
        assert_eq!(unified_range(2, 3), "3");
        assert_eq!(unified_range(0, 4), "1,4");
        assert_eq!(context_range(0, 0), "0");
        assert_eq!(context_range(2, 3), "3");
        assert_eq!(context_range(1, 4), "2,4");
    }
}
