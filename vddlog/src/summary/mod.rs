//! Suite summary files: loading, truncation recovery, and metadata extraction.

pub mod document;
pub mod recovery;

use std::path::{Path, PathBuf};

use crate::config::ReportConfig;
use crate::error::{Diagnostic, DiagnosticKind, emit};
use crate::source::read_summary_file;
use crate::suite::{ExpectedCounts, SuiteMeta, TestEntry};

use document::{Element, parse_document};
use recovery::repair_truncated;

/// A parsed suite summary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteFile {
    pub path: PathBuf,
    /// Suites in document order.
    pub suites: Vec<SuiteMeta>,
    /// The file had to be repaired before it could be parsed.
    pub recovered: bool,
}

/// Parse an `H:MM:SS[.fff]` duration into whole seconds.
///
/// Hours may have any number of digits; fractional seconds are dropped.
/// Durations that do not fit in `u64` seconds are rejected.
#[must_use]
pub fn parse_runtime(value: &str) -> Option<u64> {
    let mut parts = value.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds = parts.next()?;
    if parts.next().is_some() || minutes >= 60 {
        return None;
    }
    let whole = seconds.split_once('.').map_or(seconds, |(whole, _)| whole);
    let seconds: u64 = whole.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)
}

/// Suite name from the `suitefile` text: everything before the first `.`.
fn suite_name(suite: &Element, path: &Path) -> String {
    let from_suitefile = suite
        .child_text("suitefile")
        .and_then(|text| text.split('.').next())
        .filter(|name| !name.is_empty());

    match from_suitefile {
        Some(name) => name.to_owned(),
        None => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn expected_counts(test: &Element) -> Option<ExpectedCounts> {
    let count = |name: &str| test.child_text(name).and_then(|v| v.parse::<u64>().ok());
    let result = test.child_text("result")?;
    Some(ExpectedCounts {
        passed: result.eq_ignore_ascii_case("passed"),
        blocked: count("blocked")? != 0,
        passed_asserts: count("passedasserts")?,
        failed_asserts: count("failedasserts")?,
        exceptions: count("exceptions")?,
        errors: count("errors")?,
        watchdog: count("watchdog")?,
    })
}

/// Resolve a path from the summary against the summary's own directory.
fn resolve(path: &str, base: &Path) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

struct Extractor<'a> {
    path: &'a Path,
    base: &'a Path,
    diagnostics: Vec<Diagnostic>,
}

impl Extractor<'_> {
    fn runtime(&mut self, suite: &Element, name: &str) -> u64 {
        let mut total: u64 = 0;
        for element in suite
            .children
            .iter()
            .filter(|c| c.name == "runtime" || c.name == "totaltesttime")
        {
            if let Some(seconds) = parse_runtime(&element.text) {
                total = total.saturating_add(seconds);
            } else {
                emit(
                    &mut self.diagnostics,
                    Diagnostic::new(
                        self.path,
                        DiagnosticKind::MalformedSummary,
                        format!(
                            "Suite '{name}' has unparsable <{}> value '{}'; counting 0 seconds",
                            element.name,
                            element.text.trim()
                        ),
                    ),
                );
            }
        }
        total
    }

    fn test_entry(&mut self, test: &Element, suite_name: &str) -> Option<TestEntry> {
        let Some(log) = test.child_text("testlog").filter(|log| !log.is_empty()) else {
            emit(
                &mut self.diagnostics,
                Diagnostic::new(
                    self.path,
                    DiagnosticKind::MalformedSummary,
                    format!("Test entry in suite '{suite_name}' has no <testlog>; skipping it"),
                ),
            );
            return None;
        };

        let mut entry = TestEntry::new(resolve(log, self.base))
            .with_restart(test.child_text("isrestart").is_some_and(parse_flag));
        if let Some(test_file) = test.child_text("testfile").filter(|f| !f.is_empty()) {
            entry = entry.with_test_file(test_file);
        }
        if let Some(expected) = expected_counts(test) {
            entry = entry.with_expected(expected);
        }
        Some(entry)
    }

    fn suite(&mut self, suite: &Element, document_truncated: bool) -> SuiteMeta {
        let name = suite_name(suite, self.path);
        let mut truncated = document_truncated || suite.child("truncated").is_some();

        let mut tests = Vec::new();
        for test in suite.children_named("test") {
            if test.child("truncated").is_some() {
                truncated = true;
            }
            if let Some(entry) = self.test_entry(test, &name) {
                tests.push(entry);
            }
        }

        let runtime = self.runtime(suite, &name);
        SuiteMeta::new(name)
            .with_tests(tests)
            .with_runtime(runtime)
            .with_truncated(truncated)
    }
}

/// Extract per-suite metadata from a parsed summary document.
///
/// A top-level `<truncated/>` marks every suite of the document.
#[must_use]
pub fn extract_suites(root: &Element, path: &Path) -> (Vec<SuiteMeta>, Vec<Diagnostic>) {
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let document_truncated = root.child("truncated").is_some();
    let mut extractor = Extractor {
        path,
        base,
        diagnostics: Vec::new(),
    };

    let suites = root
        .children_named("suite")
        .map(|suite| extractor.suite(suite, document_truncated))
        .collect();

    (suites, extractor.diagnostics)
}

/// Parse summary text, repairing it once if it is not well-formed.
///
/// Returns the document root and whether it was repaired, or `None` if even
/// the repaired text does not parse.
fn parse_with_recovery(
    text: &str,
    path: &Path,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<(Element, bool)> {
    let first_error = match parse_document(text) {
        Ok(root) => return Some((root, false)),
        Err(e) => e,
    };

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let repaired = repair_truncated(text, &file_name);

    match parse_document(&repaired) {
        Ok(root) => {
            emit(
                diagnostics,
                Diagnostic::new(
                    path,
                    DiagnosticKind::RecoveredTruncation,
                    format!("Recovered truncated suite summary ({first_error})"),
                ),
            );
            Some((root, true))
        }
        Err(e) => {
            emit(
                diagnostics,
                Diagnostic::new(
                    path,
                    DiagnosticKind::Unrecoverable,
                    format!("Suite summary is not valid XML and could not be repaired: {e}"),
                ),
            );
            None
        }
    }
}

/// Load one suite summary file.
///
/// Never fails: a missing, unreadable or unrecoverable file yields `None`
/// together with the diagnostic explaining why.
#[must_use]
pub fn load_suite_file(path: &Path, config: &ReportConfig) -> (Option<SuiteFile>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    let Some(text) = read_summary_file(path, config.large_file_threshold, &mut diagnostics) else {
        return (None, diagnostics);
    };

    tracing::debug!(file = %path.display(), bytes = text.len(), "parsing suite summary");

    let Some((root, recovered)) = parse_with_recovery(&text, path, &mut diagnostics) else {
        return (None, diagnostics);
    };

    let (suites, extract_diagnostics) = extract_suites(&root, path);
    diagnostics.extend(extract_diagnostics);

    (
        Some(SuiteFile {
            path: path.to_path_buf(),
            suites,
            recovered,
        }),
        diagnostics,
    )
}
