//! Suite aggregation: per-test results rolled up into one [`SuiteSummary`].

use std::iter::Sum;
use std::ops::Add;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ReportConfig;
use crate::error::{Diagnostic, DiagnosticKind, emit};
use crate::ledger::IssueLedger;
use crate::test_log::{LogCompleteness, TestResult, process_log_file};

/// Counts the suite summary file repeats for a test.
///
/// Only used to cross-check the log; the log is the source of truth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpectedCounts {
    pub passed: bool,
    pub blocked: bool,
    pub passed_asserts: u64,
    pub failed_asserts: u64,
    pub exceptions: u64,
    pub errors: u64,
    pub watchdog: u64,
}

impl ExpectedCounts {
    /// Field names that differ from the log's result.
    fn mismatches(&self, result: &TestResult) -> Vec<&'static str> {
        let checks = [
            ("result", self.passed != result.passed()),
            ("blocked", self.blocked != result.blocked),
            ("passedasserts", self.passed_asserts != result.passed_asserts),
            ("failedasserts", self.failed_asserts != result.failed_asserts),
            ("exceptions", self.exceptions != result.exceptions),
            ("errors", self.errors != result.errors),
            ("watchdog", self.watchdog != result.watchdog),
        ];
        checks
            .into_iter()
            .filter_map(|(name, differs)| differs.then_some(name))
            .collect()
    }
}

/// One `<test>` entry of a suite summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct TestEntry {
    /// Per-test log file.
    pub log: PathBuf,
    /// Test script the log was produced by, if the summary names one.
    pub test_file: Option<PathBuf>,
    /// Restart marker from the summary entry.
    pub is_restart: bool,
    /// Counts repeated in the summary entry, when complete.
    pub expected: Option<ExpectedCounts>,
}

impl TestEntry {
    #[must_use]
    pub fn new(log: impl Into<PathBuf>) -> Self {
        Self {
            log: log.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_test_file(mut self, test_file: impl Into<PathBuf>) -> Self {
        self.test_file = Some(test_file.into());
        self
    }

    #[must_use]
    pub fn with_restart(mut self, is_restart: bool) -> Self {
        self.is_restart = is_restart;
        self
    }

    #[must_use]
    pub fn with_expected(mut self, expected: ExpectedCounts) -> Self {
        self.expected = Some(expected);
        self
    }
}

/// Per-suite metadata extracted from a suite summary file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct SuiteMeta {
    pub name: String,
    pub tests: Vec<TestEntry>,
    pub runtime_seconds: u64,
    /// The summary document (or one of its test entries) was truncated.
    pub truncated: bool,
}

impl SuiteMeta {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tests(mut self, tests: Vec<TestEntry>) -> Self {
        self.tests = tests;
        self
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime_seconds: u64) -> Self {
        self.runtime_seconds = runtime_seconds;
        self
    }

    #[must_use]
    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }
}

/// Numeric fields shared by suite summaries and run totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub passed: u64,
    pub failed: u64,
    pub blocked: u64,
    pub watchdog: u64,
    pub passed_asserts: u64,
    pub failed_asserts: u64,
    pub exceptions: u64,
    pub errors: u64,
    pub runtime_seconds: u64,
}

impl Tally {
    /// Number of tests counted as passed, failed or blocked.
    #[must_use]
    pub fn tests_counted(&self) -> u64 {
        self.passed
            .saturating_add(self.failed)
            .saturating_add(self.blocked)
    }

    fn add_counts(&mut self, result: &TestResult) {
        self.watchdog = self.watchdog.saturating_add(result.watchdog);
        self.passed_asserts = self.passed_asserts.saturating_add(result.passed_asserts);
        self.failed_asserts = self.failed_asserts.saturating_add(result.failed_asserts);
        self.exceptions = self.exceptions.saturating_add(result.exceptions);
        self.errors = self.errors.saturating_add(result.errors);
    }
}

/// Field-wise sum. Saturates at `u64::MAX`, so it stays commutative and
/// associative for any input.
impl Add for Tally {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            passed: self.passed.saturating_add(rhs.passed),
            failed: self.failed.saturating_add(rhs.failed),
            blocked: self.blocked.saturating_add(rhs.blocked),
            watchdog: self.watchdog.saturating_add(rhs.watchdog),
            passed_asserts: self.passed_asserts.saturating_add(rhs.passed_asserts),
            failed_asserts: self.failed_asserts.saturating_add(rhs.failed_asserts),
            exceptions: self.exceptions.saturating_add(rhs.exceptions),
            errors: self.errors.saturating_add(rhs.errors),
            runtime_seconds: self.runtime_seconds.saturating_add(rhs.runtime_seconds),
        }
    }
}

impl Sum for Tally {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Tally> for Tally {
    fn sum<I: Iterator<Item = &'a Tally>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Outcome of one test as shown in its suite's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Blocked,
    /// The log could not be read.
    Unreadable,
}

impl TestStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::Unreadable => "unreadable",
        }
    }
}

/// One per-test row of a suite summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct TestRow {
    pub log: PathBuf,
    pub status: TestStatus,
    pub is_restart: bool,
    pub is_library: bool,
    /// The log ended without a report line, or could not be read.
    pub truncated: bool,
    pub passed_asserts: u64,
    pub failed_asserts: u64,
    pub exceptions: u64,
    pub errors: u64,
    pub watchdog: u64,
}

impl TestRow {
    fn from_classified(test: &ClassifiedTest) -> Self {
        let result = &test.result;
        let status = if result.is_unreadable() {
            TestStatus::Unreadable
        } else if result.blocked {
            TestStatus::Blocked
        } else if result.passed() {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        };

        Self {
            log: result.log.clone(),
            status,
            is_restart: test.is_restart,
            is_library: test.is_library,
            truncated: result.is_truncated(),
            passed_asserts: result.passed_asserts,
            failed_asserts: result.failed_asserts,
            exceptions: result.exceptions,
            errors: result.errors,
            watchdog: result.watchdog,
        }
    }

    /// Whether the row enters the suite's passed/failed/blocked tallies.
    #[must_use]
    pub fn counted(&self) -> bool {
        self.status != TestStatus::Unreadable && !self.is_restart && !self.is_library
    }

    /// Log file name without its extension, as shown in reports.
    #[must_use]
    pub fn base_name(&self) -> String {
        self.log.file_stem().map_or_else(
            || self.log.display().to_string(),
            |stem| stem.to_string_lossy().into_owned(),
        )
    }
}

/// Aggregate of one suite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct SuiteSummary {
    pub name: String,
    #[serde(flatten)]
    pub counts: Tally,
    pub truncated: bool,
    /// One row per processed test log, in suite order.
    pub tests: Vec<TestRow>,
    /// Merged issues of every test in the suite.
    #[serde(skip_serializing)]
    pub issues: IssueLedger,
}

/// A processed test, ready to be tallied.
#[derive(Debug, Clone)]
pub struct ClassifiedTest {
    pub result: TestResult,
    pub issues: IssueLedger,
    pub is_restart: bool,
    pub is_library: bool,
}

/// Roll classified tests up into a suite summary.
///
/// Restart and library tests, and tests whose log could not be read, never
/// enter the passed/failed/blocked tallies; their numeric counts and issues
/// are still summed.
#[must_use]
pub fn summarize<I>(name: &str, runtime_seconds: u64, truncated: bool, tests: I) -> SuiteSummary
where
    I: IntoIterator<Item = ClassifiedTest>,
{
    let mut summary = SuiteSummary {
        name: name.to_owned(),
        counts: Tally {
            runtime_seconds,
            ..Tally::default()
        },
        truncated,
        tests: Vec::new(),
        issues: IssueLedger::new(),
    };

    for test in tests {
        let row = TestRow::from_classified(&test);
        summary.counts.add_counts(&test.result);
        summary.issues.merge(&test.issues);
        if row.truncated {
            summary.truncated = true;
        }

        if row.counted() {
            let tally = match row.status {
                TestStatus::Blocked => &mut summary.counts.blocked,
                TestStatus::Passed => &mut summary.counts.passed,
                TestStatus::Failed | TestStatus::Unreadable => &mut summary.counts.failed,
            };
            *tally = tally.saturating_add(1);
        }
        summary.tests.push(row);
    }

    summary
}

/// Result of aggregating one suite.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub summary: SuiteSummary,
    pub diagnostics: Vec<Diagnostic>,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
}

/// Check that a test entry names a readable log; returns the reason it does not.
fn reject_reason(log: &Path, config: &ReportConfig) -> Option<(DiagnosticKind, String)> {
    if !log.exists() {
        return Some((DiagnosticKind::MissingInput, "Test log does not exist".to_owned()));
    }
    if !log.is_file() {
        return Some((DiagnosticKind::NotALogFile, "Test log is not a regular file".to_owned()));
    }
    if is_hidden(log) {
        return Some((DiagnosticKind::NotALogFile, "Skipping hidden file".to_owned()));
    }
    if !has_extension(log, &config.log_extension) {
        return Some((
            DiagnosticKind::NotALogFile,
            format!("Skipping file without .{} extension", config.log_extension),
        ));
    }
    None
}

/// Aggregate every test of a suite.
#[must_use]
pub fn aggregate_suite(meta: &SuiteMeta, config: &ReportConfig) -> SuiteReport {
    let mut diagnostics = Vec::new();
    let mut truncated = meta.truncated;
    let mut tests = Vec::with_capacity(meta.tests.len());

    for entry in &meta.tests {
        if let Some((kind, message)) = reject_reason(&entry.log, config) {
            // A log that should exist but does not means the run died early.
            if kind == DiagnosticKind::MissingInput {
                truncated = true;
            }
            emit(&mut diagnostics, Diagnostic::new(&entry.log, kind, message));
            continue;
        }

        let outcome = process_log_file(&entry.log);
        diagnostics.extend(outcome.diagnostics);

        let result = outcome.result;
        if let Some(expected) = &entry.expected
            && result.completeness == LogCompleteness::Complete
        {
            let mismatched = expected.mismatches(&result);
            if !mismatched.is_empty() {
                emit(
                    &mut diagnostics,
                    Diagnostic::new(
                        &entry.log,
                        DiagnosticKind::CountMismatch,
                        format!(
                            "Suite summary disagrees with the test log on: {}",
                            mismatched.join(", ")
                        ),
                    ),
                );
            }
        }

        let is_library = entry
            .test_file
            .as_deref()
            .is_some_and(|file| config.library_policy.is_library(file));

        tests.push(ClassifiedTest {
            is_restart: result.is_restart || entry.is_restart,
            is_library,
            result,
            issues: outcome.issues,
        });
    }

    let summary = summarize(&meta.name, meta.runtime_seconds, truncated, tests);
    tracing::debug!(
        suite = %summary.name,
        passed = summary.counts.passed,
        failed = summary.counts.failed,
        blocked = summary.counts.blocked,
        truncated = summary.truncated,
        "suite aggregated"
    );

    SuiteReport {
        summary,
        diagnostics,
    }
}
