//! HTML diff report
//!
//! One report file is written per invocation. Every case gets a section as
//! soon as it completes: passing cases collapsed, failing cases expanded,
//! each with the input, the files the input refers to and a side-by-side
//! diff table. The document is self-contained (inline style, no scripts) so
//! it can be opened or passed around as a single file.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::comparison::{DiffRow, RowKind};
use crate::config::DEFAULT_EMBED_LIMIT;
use crate::execution::{CaseOutcome, CaseResult};
use crate::TestError;

/// Shown instead of a diff when only the final newline is missing
pub const MISSING_NEWLINE_MESSAGE: &str =
    "So close! Your output matches, but the last line is missing its newline.";

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 1.5em; color: #222; }
h1 { font-size: 1.4em; }
.meta { color: #666; font-size: 0.9em; }
details.case { border: 1px solid #ccc; border-radius: 4px; margin: 0.6em 0; padding: 0.3em 0.6em; }
details.case > summary { cursor: pointer; font-weight: bold; }
details.pass > summary .status { color: #1a7f37; }
details.fail > summary .status { color: #cf222e; }
details.input, details.aux { margin: 0.5em 0 0.5em 1em; }
pre { margin: 0; font-family: monospace; white-space: pre-wrap; }
table.listing td, table.diff td { font-family: monospace; white-space: pre-wrap; vertical-align: top; padding: 0 0.4em; }
td.lineno { color: #888; text-align: right; user-select: none; }
table.diff { border-collapse: collapse; margin: 0.5em 0; }
table.diff th { background: #eee; text-align: left; padding: 0.2em 0.4em; }
table.diff caption { text-align: left; font-style: italic; color: #555; }
.add { background: #aaffaa; }
.chg { background: #ffff77; }
.sub { background: #ffaaaa; }
.eol { color: #cf222e; font-style: italic; }
.truncated, .note { color: #9a6700; font-style: italic; }
.notice { border: 2px solid #cf222e; padding: 0.5em; font-weight: bold; }
table.legend { border: 1px solid #ccc; margin-top: 1.5em; }
table.legend td { padding: 0.2em 0.6em; }
.disclaimer { color: #666; font-size: 0.85em; margin-top: 1em; }
"#;

/// Totals of a finished report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub path: PathBuf,
    pub passed: usize,
    pub failed: usize,
    pub interrupted: bool,
}

/// Accumulates case sections into an HTML file
pub struct ReportBuilder {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    root: Option<PathBuf>,
    embed_limit: usize,
    passed: usize,
    failed: usize,
    interrupted: bool,
}

impl ReportBuilder {
    /// Create the report file for `suite` and write its header
    pub fn open(path: impl Into<PathBuf>, suite: &str) -> Result<Self, TestError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(&path)?);

        let suite = escape(suite);
        writeln!(writer, "<!DOCTYPE html>")?;
        writeln!(writer, "<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">")?;
        writeln!(writer, "<title>Test report: {}</title>", suite)?;
        writeln!(writer, "<style>{}</style>\n</head>\n<body>", STYLE)?;
        writeln!(writer, "<h1>Test report for {}</h1>", suite)?;
        writeln!(
            writer,
            "<p class=\"meta\">Generated {} by fixture-tester {}</p>",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            crate::VERSION
        )?;
        writer.flush()?;

        debug!("Opened report {}", path.display());
        Ok(Self {
            path,
            writer: Some(writer),
            root: None,
            embed_limit: DEFAULT_EMBED_LIMIT,
            passed: 0,
            failed: 0,
            interrupted: false,
        })
    }

    /// Show paths relative to `root`
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Characters of each referenced file to embed
    pub fn with_embed_limit(mut self, embed_limit: usize) -> Self {
        self.embed_limit = embed_limit;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the section for one completed case
    pub fn record(&mut self, result: CaseResult) -> Result<(), TestError> {
        let section = self.render_case(&result);
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TestError::Execution("Report already finished".to_string()))?;
        writer.write_all(section.as_bytes())?;
        writer.flush()?;

        if result.passed() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        Ok(())
    }

    /// Note that the run stopped before all cases were executed
    pub fn mark_interrupted(&mut self) {
        self.interrupted = true;
    }

    /// Write the closing notices and legend and close the file
    pub fn finish(mut self) -> Result<ReportSummary, TestError> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| TestError::Execution("Report already finished".to_string()))?;
        writer.write_all(self.render_footer().as_bytes())?;
        writer.flush()?;

        debug!("Finished report {}", self.path.display());
        Ok(ReportSummary {
            path: self.path.clone(),
            passed: self.passed,
            failed: self.failed,
            interrupted: self.interrupted,
        })
    }

    fn render_case(&self, result: &CaseResult) -> String {
        let case = &result.case;
        let mut html = String::new();

        let (class, open, status) = match result.outcome {
            CaseOutcome::Passed => ("pass", "", "PASSED"),
            CaseOutcome::Failed | CaseOutcome::MissingNewline => ("fail", " open", "FAILED"),
        };
        let _ = writeln!(html, "<details class=\"case {}\"{}>", class, open);
        let _ = writeln!(
            html,
            "<summary><span class=\"status\">{}</span> {}: test {}</summary>",
            status,
            escape(&case.program),
            escape(&case.label)
        );

        let _ = writeln!(
            html,
            "<details class=\"input\"><summary>Input ({})</summary>",
            escape(&self.display(&case.input))
        );
        html.push_str(&render_listing(&result.input));
        html.push_str("</details>\n");

        for file in &result.aux_files {
            html.push_str(&self.render_aux_file(file));
        }

        if !result.ops.is_empty() {
            let _ = writeln!(
                html,
                "<p class=\"note\">Output normalized with: {}</p>",
                escape(&result.ops.join(", "))
            );
        }

        if result.outcome == CaseOutcome::MissingNewline {
            let _ = writeln!(html, "<p class=\"note\">{}</p>", escape(MISSING_NEWLINE_MESSAGE));
        }

        html.push_str(&self.render_diff_table(result));
        html.push_str("</details>\n");
        html
    }

    fn render_aux_file(&self, file: &Path) -> String {
        let mut html = String::new();
        let _ = writeln!(
            html,
            "<details class=\"aux\"><summary>Referenced file {}</summary>",
            escape(&self.display(file))
        );
        match fs::read(file) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let (shown, hidden) = truncate_at_line(&text, self.embed_limit);
                let _ = writeln!(html, "<pre>{}</pre>", escape(shown));
                if hidden > 0 {
                    let _ = writeln!(
                        html,
                        "<p class=\"truncated\">... {} additional characters not shown</p>",
                        hidden
                    );
                }
            }
            Err(e) => {
                warn!("Could not embed {}: {}", file.display(), e);
                let _ = writeln!(html, "<p class=\"note\">Could not read file: {}</p>", escape(&e.to_string()));
            }
        }
        html.push_str("</details>\n");
        html
    }

    fn render_diff_table(&self, result: &CaseResult) -> String {
        let case = &result.case;
        let comparison = &result.comparison;
        let mut html = String::new();

        html.push_str("<table class=\"diff\">\n");
        if comparison.has_differences() {
            let _ = writeln!(
                html,
                "<caption>{} line(s) differ</caption>",
                comparison.added_lines.max(comparison.removed_lines)
            );
        } else {
            html.push_str("<caption>No differences</caption>\n");
        }
        let _ = writeln!(
            html,
            "<tr><th></th><th>Expected ({})</th><th></th><th>Actual ({})</th></tr>",
            escape(&self.display(&case.expected)),
            escape(&self.display(&case.actual))
        );

        for row in &comparison.rows {
            html.push_str(&render_row(row));
        }
        html.push_str("</table>\n");
        html
    }

    fn render_footer(&self) -> String {
        let mut html = String::new();

        if self.passed + self.failed == 0 {
            html.push_str("<p class=\"notice\">No tests were run.</p>\n");
        }
        if self.interrupted {
            html.push_str(
                "<p class=\"notice\">Execution was interrupted; this report is incomplete.</p>\n",
            );
        }
        let _ = writeln!(
            html,
            "<p>{} case(s) recorded: {} passed, {} failed.</p>",
            self.passed + self.failed,
            self.passed,
            self.failed
        );

        html.push_str(concat!(
            "<table class=\"legend\">\n",
            "<tr><th colspan=\"2\">Legend</th></tr>\n",
            "<tr><td class=\"add\">Added</td><td>Line in the actual output that is not in the expected output</td></tr>\n",
            "<tr><td class=\"chg\">Changed</td><td>Line that differs between expected and actual output</td></tr>\n",
            "<tr><td class=\"sub\">Deleted</td><td>Line in the expected output that is missing from the actual output</td></tr>\n",
            "<tr><td><span class=\"eol\">(no newline)</span></td><td>Line not terminated by a newline</td></tr>\n",
            "</table>\n",
        ));
        html.push_str(concat!(
            "<p class=\"disclaimer\">These tests only exercise the published examples. ",
            "Passing all of them does not guarantee that a program is correct, ",
            "and output is compared as text with no understanding of what it means.</p>\n",
        ));
        html.push_str("</body>\n</html>\n");
        html
    }

    fn display(&self, path: &Path) -> String {
        self.root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

impl Drop for ReportBuilder {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            self.interrupted = true;
            let footer = self.render_footer();
            if let Err(e) = writer.write_all(footer.as_bytes()).and_then(|_| writer.flush()) {
                warn!("Failed to close report {}: {}", self.path.display(), e);
            }
        }
    }
}

fn render_listing(text: &str) -> String {
    let mut html = String::from("<table class=\"listing\">\n");
    for (index, line) in text.lines().enumerate() {
        let _ = writeln!(
            html,
            "<tr><td class=\"lineno\">{}</td><td>{}</td></tr>",
            index + 1,
            escape(line)
        );
    }
    html.push_str("</table>\n");
    html
}

fn render_row(row: &DiffRow) -> String {
    let (left_class, right_class) = match row.kind {
        RowKind::Equal => ("", ""),
        RowKind::Changed => ("chg", "chg"),
        RowKind::Deleted => ("sub", ""),
        RowKind::Added => ("", "add"),
    };
    format!(
        "<tr>{}{}</tr>\n",
        render_cell(row.expected.as_ref(), left_class),
        render_cell(row.actual.as_ref(), right_class)
    )
}

fn render_cell(line: Option<&(usize, String)>, class: &str) -> String {
    match line {
        Some((number, text)) => {
            let (body, eol) = match text.strip_suffix('\n') {
                Some(body) => (body, ""),
                None => (text.as_str(), " <span class=\"eol\">(no newline)</span>"),
            };
            format!(
                "<td class=\"lineno\">{}</td><td class=\"{}\">{}{}</td>",
                number,
                class,
                escape(body),
                eol
            )
        }
        None => format!("<td class=\"lineno\"></td><td class=\"{}\"></td>", class),
    }
}

/// Cut `text` to at most `limit` characters, preferring the end of a line.
/// Returns the kept prefix and the number of characters dropped.
pub fn truncate_at_line(text: &str, limit: usize) -> (&str, usize) {
    let total = text.chars().count();
    if total <= limit {
        return (text, 0);
    }

    let cut = text.char_indices().nth(limit).map(|(i, _)| i).unwrap_or(text.len());
    let kept = match text[..cut].rfind('\n') {
        Some(newline) => &text[..=newline],
        None => &text[..cut],
    };
    (kept, total - kept.chars().count())
}

/// Escape text for HTML element content and attribute values
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
