//! Report artifacts: the run summary and the issues tables.
//!
//! Each artifact comes in two renderings, JSON and plain text. Color and
//! terminal formatting are left to the CLI layer.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::OutputFormat;
use crate::error::OutputError;
use crate::ledger::IssueCategory;
use crate::report::RunReport;
use crate::suite::{Tally, TestRow};

/// Base file name of the run summary artifact.
pub const SUMMARY_FILE_STEM: &str = "summary";
/// Base file name of the issues artifact.
pub const ISSUES_FILE_STEM: &str = "issues";

const RULE_WIDTH: usize = 100;

/// Format seconds as `H:MM:SS`.
#[must_use]
pub fn format_runtime(seconds: u64) -> String {
    let hours = seconds.div_euclid(3600);
    let minutes = seconds.rem_euclid(3600).div_euclid(60);
    let secs = seconds.rem_euclid(60);
    format!("{hours}:{minutes:02}:{secs:02}")
}

/// Write the run summary as JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_summary_json(report: &RunReport, writer: &mut dyn Write) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(report)?;
    writeln!(writer, "{json}")?;
    Ok(())
}

fn write_row(
    writer: &mut dyn Write,
    name: &str,
    counts: &Tally,
    flag: &str,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "{name:<30} {:>7} {:>7} {:>7} {:>8} {:>8} {:>8} {:>10} {:>7} {:>10} {flag}",
        counts.passed,
        counts.failed,
        counts.blocked,
        counts.watchdog,
        counts.passed_asserts,
        counts.failed_asserts,
        counts.exceptions,
        counts.errors,
        format_runtime(counts.runtime_seconds),
    )
}

fn write_test_row(writer: &mut dyn Write, test: &TestRow) -> std::io::Result<()> {
    let flags = [
        (test.is_restart, " (restart)"),
        (test.is_library, " (library)"),
        (test.truncated, " (truncated)"),
    ]
    .into_iter()
    .filter_map(|(set, label)| set.then_some(label))
    .collect::<String>();

    writeln!(
        writer,
        "    {:<26} {:<10} asserts {}/{}  exceptions {}  errors {}  watchdog {}{flags}",
        test.base_name(),
        test.status.as_str(),
        test.passed_asserts,
        test.failed_asserts,
        test.exceptions,
        test.errors,
        test.watchdog,
    )
}

/// Write the run summary as plain text: one row per suite followed by its
/// indented per-test rows, then the totals.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_summary_human(report: &RunReport, writer: &mut dyn Write) -> Result<(), OutputError> {
    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(writer, "  VOODOODRIVER RUN SUMMARY")?;
    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(writer)?;
    writeln!(writer, "  Suite files loaded:  {}", report.suite_files)?;
    writeln!(writer, "  Suite files skipped: {}", report.failed_files)?;
    writeln!(writer, "  Suites:              {}", report.suites.len())?;
    writeln!(writer)?;

    writeln!(
        writer,
        "{:<30} {:>7} {:>7} {:>7} {:>8} {:>8} {:>8} {:>10} {:>7} {:>10}",
        "Suite",
        "Passed",
        "Failed",
        "Blocked",
        "Watchdog",
        "Asserts+",
        "Asserts-",
        "Exceptions",
        "Errors",
        "Runtime"
    )?;
    writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;
    for suite in &report.suites {
        let flag = if suite.truncated { "(truncated)" } else { "" };
        write_row(writer, &suite.name, &suite.counts, flag)?;
        for test in &suite.tests {
            write_test_row(writer, test)?;
        }
    }
    writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;
    write_row(writer, "Totals", &report.totals.counts, "")?;
    writeln!(writer)?;

    if !report.diagnostics.is_empty() {
        writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;
        writeln!(writer, "  DIAGNOSTICS ({})", report.diagnostics.len())?;
        writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;
        for diagnostic in &report.diagnostics {
            writeln!(writer, "{}", diagnostic.format_human_readable())?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;
    Ok(())
}

#[derive(Serialize)]
struct IssueRow<'a> {
    issue: &'a str,
    count: u64,
}

#[derive(Serialize)]
struct IssueTables<'a> {
    errors: Vec<IssueRow<'a>>,
    exceptions: Vec<IssueRow<'a>>,
    warnings: Vec<IssueRow<'a>>,
}

fn issue_rows(report: &RunReport, category: IssueCategory) -> Vec<IssueRow<'_>> {
    report
        .issues
        .sorted(category)
        .into_iter()
        .map(|(issue, count)| IssueRow { issue, count })
        .collect()
}

/// Write the run-wide issues as JSON, each category sorted by ascending count.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_issues_json(report: &RunReport, writer: &mut dyn Write) -> Result<(), OutputError> {
    let tables = IssueTables {
        errors: issue_rows(report, IssueCategory::Error),
        exceptions: issue_rows(report, IssueCategory::Exception),
        warnings: issue_rows(report, IssueCategory::Warning),
    };
    let json = serde_json::to_string_pretty(&tables)?;
    writeln!(writer, "{json}")?;
    Ok(())
}

/// Write the run-wide issues as plain text, each category sorted by ascending count.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_issues_human(report: &RunReport, writer: &mut dyn Write) -> Result<(), OutputError> {
    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(writer, "  VOODOODRIVER RUN ISSUES")?;
    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;

    for category in IssueCategory::ALL {
        let rows = report.issues.sorted(category);
        writeln!(writer)?;
        writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;
        writeln!(
            writer,
            "  {} ({} distinct, {} total)",
            category.as_str().to_uppercase(),
            rows.len(),
            report.issues.total(category)
        )?;
        writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;
        if rows.is_empty() {
            writeln!(writer, "  none")?;
        }
        for (issue, count) in rows {
            writeln!(writer, "{count:>8}  {issue}")?;
        }
    }

    writeln!(writer)?;
    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;
    Ok(())
}

/// Artifacts written by [`write_report_files`].
#[derive(Debug, Default)]
pub struct ReportFiles {
    /// Paths that were written successfully.
    pub written: Vec<PathBuf>,
    /// One error per artifact that could not be written.
    pub failures: Vec<OutputError>,
}

impl ReportFiles {
    #[must_use]
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

type Renderer = fn(&RunReport, &mut dyn Write) -> Result<(), OutputError>;

fn write_artifact(
    path: PathBuf,
    report: &RunReport,
    render: Renderer,
) -> Result<PathBuf, OutputError> {
    let mut buffer = Vec::new();
    render(report, &mut buffer)?;
    match std::fs::write(&path, buffer) {
        Ok(()) => Ok(path),
        Err(source) => Err(OutputError::Write { path, source }),
    }
}

/// Write `summary.<ext>` and `issues.<ext>` into `dir`.
///
/// The directory is not created. Each artifact is rendered fully before the
/// file is opened, and a failure on one artifact does not stop the other.
#[must_use]
pub fn write_report_files(report: &RunReport, dir: &Path, format: OutputFormat) -> ReportFiles {
    let (summary, issues): (Renderer, Renderer) = match format {
        OutputFormat::Human => (write_summary_human, write_issues_human),
        OutputFormat::Json => (write_summary_json, write_issues_json),
    };

    let mut files = ReportFiles::default();
    for (stem, render) in [(SUMMARY_FILE_STEM, summary), (ISSUES_FILE_STEM, issues)] {
        let path = dir.join(format!("{stem}.{}", format.extension()));
        match write_artifact(path, report, render) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "wrote report");
                files.written.push(path);
            }
            Err(e) => {
                tracing::error!("{e}");
                files.failures.push(e);
            }
        }
    }
    files
}
