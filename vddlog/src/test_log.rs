//! Per-test log processing.
//!
//! A per-test log is a sequence of lines of the form
//! `[<start>-<end>](<status>)<message>`. Each line is classified by its status
//! character; failures are filed as exceptions or plain errors depending on
//! whether the following line opens a backtrace. The terminal
//! `Soda Test Report` line carries the authoritative counts for the test.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{Diagnostic, DiagnosticKind, emit};
use crate::ledger::{IssueCategory, IssueLedger};
use crate::lookahead::Lookahead;

/// Message prefix of a backtrace continuation line.
pub const BACKTRACE_MARKER: &str = "--Exception Backtrace";

/// Message prefix of the per-test summary line.
pub const REPORT_MARKER: &str = "Soda Test Report";

/// Replacement for volatile substrings in exception keys.
pub const VOLATILE_PLACEHOLDER: &str = "<...>";

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"^\[([^\]]*)\]\((.)\)(.*)$") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid log line regex: {err}"),
    }
});

/// Trailing environment dumps appended by the browser driver.
static ENVIRONMENT_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"(?i)\s*(?:build info|system info|driver info):.*$") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid environment tail regex: {err}"),
    }
});

static VOLATILE_PATTERNS: LazyLock<Vec<(Regex, String)>> = LazyLock::new(|| {
    [
        (
            concat!(
                r"(?i)(command duration or timeout:\s*)\d+(?:\.\d+)?",
                r"(\s*(?:milliseconds|seconds|ms|s)\b)",
            ),
            format!("${{1}}{VOLATILE_PLACEHOLDER}${{2}}"),
        ),
        (
            r"(?i)(session id:\s*)[0-9a-f][0-9a-f-]*",
            format!("${{1}}{VOLATILE_PLACEHOLDER}"),
        ),
        (
            r"(?i)(after:?\s*'?)\d+('?\s*seconds)",
            format!("${{1}}{VOLATILE_PLACEHOLDER}${{2}}"),
        ),
    ]
    .into_iter()
    .map(|(pattern, replacement)| match Regex::new(pattern) {
        Ok(regex) => (regex, replacement),
        Err(err) => panic!("Invalid volatile pattern regex: {err}"),
    })
    .collect()
});

/// Severity signalled by the status character of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// `!`
    Failure,
    /// `W`
    Warning,
    /// `M`
    LoadUnload,
    /// Any other character.
    Info(char),
}

impl LineStatus {
    #[must_use]
    pub fn from_char(c: char) -> Self {
        match c {
            '!' => Self::Failure,
            'W' => Self::Warning,
            'M' => Self::LoadUnload,
            other => Self::Info(other),
        }
    }
}

/// A log line split into its grammar parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLine<'a> {
    /// Stamp before the first `-` inside the brackets.
    pub start: &'a str,
    /// Stamp after the first `-`, if any.
    pub end: Option<&'a str>,
    pub status: LineStatus,
    pub message: &'a str,
}

impl<'a> LogLine<'a> {
    /// Parse a raw line. Returns `None` if it does not follow the grammar.
    #[must_use]
    pub fn parse(line: &'a str) -> Option<Self> {
        let caps = LINE_PATTERN.captures(line)?;
        let stamp = caps.get(1)?.as_str();
        let status = caps.get(2)?.as_str().chars().next()?;
        let message = caps.get(3)?.as_str();

        let (start, end) = match stamp.split_once('-') {
            Some((start, end)) => (start, Some(end)),
            None => (stamp, None),
        };

        Some(Self {
            start,
            end,
            status: LineStatus::from_char(status),
            message,
        })
    }

    /// Whether this line continues a backtrace.
    #[must_use]
    pub fn is_backtrace(&self) -> bool {
        self.message.starts_with(BACKTRACE_MARKER)
    }
}

/// Fields of a `Soda Test Report` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestReport {
    pub testlog: String,
    pub result: i64,
    pub is_restart: bool,
    pub failed_asserts: u64,
    pub exceptions: u64,
    pub errors: u64,
    pub blocked: bool,
    pub passed_asserts: u64,
    pub watchdog: u64,
}

impl TestReport {
    /// Parse the message of a report line.
    ///
    /// The driver writes the nine `--key:value` fields in hash order, so any
    /// order is accepted; every field must be present and well-typed.
    #[must_use]
    pub fn parse(message: &str) -> Option<Self> {
        let rest = message.strip_prefix(REPORT_MARKER)?;
        let rest = rest.strip_prefix(':').unwrap_or(rest);

        let mut fields: HashMap<&str, &str> = HashMap::new();
        for field in rest.split("--").filter(|f| !f.is_empty()) {
            let (key, value) = field.split_once(':')?;
            fields.insert(key.trim(), value.trim());
        }

        let count = |key: &str| fields.get(key).and_then(|v| v.parse::<u64>().ok());

        Some(Self {
            testlog: (*fields.get("testlog")?).to_owned(),
            result: fields.get("result")?.parse().ok()?,
            is_restart: parse_bool(fields.get("isrestart")?)?,
            failed_asserts: count("failedasserts")?,
            exceptions: count("exceptions")?,
            errors: count("errors")?,
            blocked: count("blocked")? != 0,
            passed_asserts: count("passedasserts")?,
            watchdog: count("watchdog")?,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") || value == "1" {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") || value == "0" {
        Some(false)
    } else {
        None
    }
}

/// How much of a log could be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCompleteness {
    /// The log ends with a valid test report line.
    #[default]
    Complete,
    /// No valid report line; counts were taken from the observed lines.
    Truncated,
    /// The log could not be opened.
    Unreadable,
}

/// Structured result of one per-test log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct TestResult {
    pub log: PathBuf,
    /// Raw result code of the report line (0 passed, -1 failed).
    pub result_code: i64,
    pub is_restart: bool,
    pub blocked: bool,
    pub passed_asserts: u64,
    pub failed_asserts: u64,
    pub exceptions: u64,
    pub errors: u64,
    pub watchdog: u64,
    pub completeness: LogCompleteness,
}

impl TestResult {
    /// Result for a log that could not be read at all.
    #[must_use]
    pub fn unreadable(log: impl Into<PathBuf>) -> Self {
        Self {
            log: log.into(),
            completeness: LogCompleteness::Unreadable,
            ..Self::default()
        }
    }

    /// Result built from a report line.
    #[must_use]
    pub fn from_report(log: impl Into<PathBuf>, report: &TestReport) -> Self {
        Self {
            log: log.into(),
            result_code: report.result,
            is_restart: report.is_restart,
            blocked: report.blocked,
            passed_asserts: report.passed_asserts,
            failed_asserts: report.failed_asserts,
            exceptions: report.exceptions,
            errors: report.errors,
            watchdog: report.watchdog,
            completeness: LogCompleteness::Complete,
        }
    }

    /// A test failed iff it has failed asserts, exceptions, errors, or was blocked.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.failed_asserts != 0 || self.exceptions != 0 || self.errors != 0 || self.blocked
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        !self.failed()
    }

    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.completeness != LogCompleteness::Complete
    }

    #[must_use]
    pub fn is_unreadable(&self) -> bool {
        self.completeness == LogCompleteness::Unreadable
    }
}

/// Everything produced by scanning one log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestOutcome {
    pub result: TestResult,
    pub issues: IssueLedger,
    pub diagnostics: Vec<Diagnostic>,
}

/// Replace volatile substrings (durations, session ids) so that otherwise
/// identical exceptions share one ledger key.
#[must_use]
pub fn normalize_exception(message: &str) -> String {
    let mut text = ENVIRONMENT_TAIL.replace(message, "").into_owned();
    for (pattern, replacement) in VOLATILE_PATTERNS.iter() {
        text = pattern.replace_all(&text, replacement.as_str()).into_owned();
    }
    text.trim_end().to_owned()
}

/// Counts observed directly in the log lines; used when the report line is missing.
#[derive(Debug, Default)]
struct ObservedCounts {
    passed_asserts: u64,
    failed_asserts: u64,
    exceptions: u64,
    errors: u64,
    watchdog: u64,
}

struct LogScan<'a> {
    log: &'a Path,
    issues: IssueLedger,
    report: Option<TestReport>,
    observed: ObservedCounts,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> LogScan<'a> {
    fn new(log: &'a Path) -> Self {
        Self {
            log,
            issues: IssueLedger::new(),
            report: None,
            observed: ObservedCounts::default(),
            diagnostics: Vec::new(),
        }
    }

    fn classify(&mut self, line_number: usize, line: &str, next: Option<&str>) {
        let Some(parsed) = LogLine::parse(line) else {
            emit(
                &mut self.diagnostics,
                Diagnostic::new(
                    self.log,
                    DiagnosticKind::MalformedLine,
                    "Skipping line that does not match [stamp](status)message",
                )
                .at_line(line_number),
            );
            return;
        };

        if parsed.message.starts_with(REPORT_MARKER) {
            match TestReport::parse(parsed.message) {
                Some(report) => self.report = Some(report),
                None => emit(
                    &mut self.diagnostics,
                    Diagnostic::new(
                        self.log,
                        DiagnosticKind::MalformedReportLine,
                        "Test report line is missing fields; no counts taken from it",
                    )
                    .at_line(line_number),
                ),
            }
            return;
        }

        let message = parsed.message;
        if message.contains("Assert Passed") {
            self.observed.passed_asserts += 1;
        }

        match parsed.status {
            LineStatus::Failure => {
                if parsed.is_backtrace() {
                    return;
                }
                let opens_backtrace = next
                    .and_then(LogLine::parse)
                    .is_some_and(|following| following.is_backtrace());

                if opens_backtrace {
                    self.issues
                        .record(IssueCategory::Exception, normalize_exception(message));
                    self.observed.exceptions += 1;
                } else {
                    self.issues.record(IssueCategory::Error, message);
                    if message.contains("Assert Failed") {
                        self.observed.failed_asserts += 1;
                    } else if message.contains("watchdogged out") {
                        self.observed.watchdog += 1;
                    } else {
                        self.observed.errors += 1;
                    }
                }
            }
            LineStatus::Warning => self.issues.record(IssueCategory::Warning, message),
            LineStatus::LoadUnload | LineStatus::Info(_) => {}
        }
    }

    fn finish(mut self) -> TestOutcome {
        let result = if let Some(report) = &self.report {
            TestResult::from_report(self.log, report)
        } else {
            emit(
                &mut self.diagnostics,
                Diagnostic::new(
                    self.log,
                    DiagnosticKind::MissingReportLine,
                    "Log ends without a test report line; using observed counts",
                ),
            );
            TestResult {
                log: self.log.to_path_buf(),
                result_code: 0,
                is_restart: false,
                blocked: false,
                passed_asserts: self.observed.passed_asserts,
                failed_asserts: self.observed.failed_asserts,
                exceptions: self.observed.exceptions,
                errors: self.observed.errors,
                watchdog: self.observed.watchdog,
                completeness: LogCompleteness::Truncated,
            }
        };

        TestOutcome {
            result,
            issues: self.issues,
            diagnostics: self.diagnostics,
        }
    }
}

/// Process the lines of a log that has already been read.
#[must_use]
pub fn process_lines<I>(log: &Path, lines: I) -> TestOutcome
where
    I: IntoIterator<Item = String>,
{
    let mut scan = LogScan::new(log);
    let mut lookahead = Lookahead::new(lines.into_iter());
    let mut line_number: usize = 0;

    while lookahead.advance() {
        line_number += 1;
        if let Some(line) = lookahead.current() {
            scan.classify(line_number, line, lookahead.peek());
        }
    }

    scan.finish()
}

fn decode_line(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_suffix('\r').unwrap_or(&text).to_owned()
}

/// Read and process one per-test log file.
///
/// Never fails: an unreadable file yields an `Unreadable` result with an
/// `IoError` diagnostic, and a read error part-way through marks the result
/// truncated.
#[must_use]
pub fn process_log_file(log: &Path) -> TestOutcome {
    let file = match File::open(log) {
        Ok(f) => f,
        Err(e) => {
            let mut diagnostics = Vec::new();
            emit(
                &mut diagnostics,
                Diagnostic::new(log, DiagnosticKind::IoError, format!("Failed to open input: {e}")),
            );
            return TestOutcome {
                result: TestResult::unreadable(log),
                issues: IssueLedger::new(),
                diagnostics,
            };
        }
    };

    tracing::debug!(log = %log.display(), "processing test log");

    let mut read_error = None;
    let mut outcome = {
        let lines = BufReader::new(file)
            .split(b'\n')
            .map_while(|chunk| match chunk {
                Ok(bytes) => Some(decode_line(&bytes)),
                Err(e) => {
                    read_error = Some(e);
                    None
                }
            });
        process_lines(log, lines)
    };

    if let Some(e) = read_error {
        outcome.result.completeness = LogCompleteness::Truncated;
        emit(
            &mut outcome.diagnostics,
            Diagnostic::new(log, DiagnosticKind::IoError, format!("Input error: {e}")),
        );
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PASS_REPORT: &str = "[01/02/2013-10:00:05.000](*)Soda Test Report:--testlog:/tmp/a.log\
                               --result:0--isrestart:false--failedasserts:0--exceptions:0\
                               --errors:0--blocked:0--passedasserts:3--watchdog:0";

    fn scan(lines: &[&str]) -> TestOutcome {
        process_lines(
            Path::new("test.log"),
            lines.iter().map(|l| (*l).to_owned()),
        )
    }

    #[test]
    fn test_parse_line_parts() {
        let line = LogLine::parse("[01/02/2013-10:11:12.123](W)Slow response").unwrap();
        assert_eq!(line.start, "01/02/2013");
        assert_eq!(line.end, Some("10:11:12.123"));
        assert_eq!(line.status, LineStatus::Warning);
        assert_eq!(line.message, "Slow response");
    }

    #[test]
    fn test_parse_line_without_dash() {
        let line = LogLine::parse("[T](!)Foo").unwrap();
        assert_eq!(line.start, "T");
        assert_eq!(line.end, None);
        assert_eq!(line.status, LineStatus::Failure);
    }

    #[test]
    fn test_parse_line_rejects_bad_grammar() {
        assert!(LogLine::parse("no brackets here").is_none());
        assert!(LogLine::parse("[T]missing status").is_none());
        assert!(LogLine::parse("[T](!!)two status chars").is_none());
    }

    #[test]
    fn test_failure_followed_by_backtrace_is_exception() {
        let outcome = scan(&["[T](!)Foo", "[T](M)--Exception Backtrace: --a.b(C.java:1)"]);
        let exceptions = outcome.issues.get(IssueCategory::Exception);
        assert_eq!(exceptions.get("Foo"), Some(&1));
        assert!(outcome.issues.get(IssueCategory::Error).is_empty());
    }

    #[test]
    fn test_failure_without_backtrace_is_error() {
        let outcome = scan(&["[T](!)Foo", "[T](*)Clicking Link: next"]);
        assert_eq!(outcome.issues.get(IssueCategory::Error).get("Foo"), Some(&1));
        assert!(outcome.issues.get(IssueCategory::Exception).is_empty());
    }

    #[test]
    fn test_failure_on_last_line_is_error() {
        let outcome = scan(&["[T](!)Foo"]);
        assert_eq!(outcome.issues.get(IssueCategory::Error).get("Foo"), Some(&1));
    }

    #[test]
    fn test_backtrace_line_is_not_recorded() {
        let outcome = scan(&[
            "[T](!)Boom",
            "[T](!)--Exception Backtrace: --x.y(Z.java:2)",
        ]);
        assert_eq!(outcome.issues.get(IssueCategory::Exception).len(), 1);
        assert!(outcome.issues.get(IssueCategory::Error).is_empty());
    }

    #[test]
    fn test_warning_never_uses_lookahead() {
        let outcome = scan(&["[T](W)Careful", "[T](M)--Exception Backtrace: --x"]);
        assert_eq!(outcome.issues.get(IssueCategory::Warning).get("Careful"), Some(&1));
        assert!(outcome.issues.get(IssueCategory::Exception).is_empty());
    }

    #[test]
    fn test_exception_keys_are_normalized() {
        let outcome = scan(&[
            "[T](!)Element not found Command duration or timeout: 30 milliseconds \
             Session ID: 9f2c1e",
            "[T](!)--Exception Backtrace: --x",
            "[T](!)Element not found Command duration or timeout: 1250 milliseconds \
             Session ID: 0aa17b",
            "[T](!)--Exception Backtrace: --x",
        ]);
        let exceptions = outcome.issues.get(IssueCategory::Exception);
        assert_eq!(exceptions.len(), 1, "got: {exceptions:?}");
        assert_eq!(exceptions.values().sum::<u64>(), 2);
    }

    #[test]
    fn test_normalize_exception() {
        assert_eq!(
            normalize_exception("Timed out Command duration or timeout: 30 milliseconds"),
            "Timed out Command duration or timeout: <...> milliseconds"
        );
        assert_eq!(
            normalize_exception("Lost browser Session ID: 1234-abcd"),
            "Lost browser Session ID: <...>"
        );
        assert_eq!(
            normalize_exception(
                "NoSuchElement  Build info: version: '2.25.0' System info: os.name",
            ),
            "NoSuchElement"
        );
        assert_eq!(
            normalize_exception("Watchdog fired after: '120' seconds"),
            "Watchdog fired after: '<...>' seconds"
        );
        assert_eq!(
            normalize_exception("Script hung after 45 seconds"),
            "Script hung after <...> seconds"
        );
        assert_eq!(normalize_exception("Plain message"), "Plain message");
    }

    #[test]
    fn test_report_line_populates_result() {
        let outcome = scan(&["[T](*)Test: login.xml", PASS_REPORT]);
        let result = &outcome.result;
        assert_eq!(result.completeness, LogCompleteness::Complete);
        assert_eq!(result.passed_asserts, 3);
        assert!(result.passed());
        assert!(!result.is_truncated());
    }

    #[test]
    fn test_report_line_any_field_order() {
        let report = TestReport::parse(
            "Soda Test Report--watchdog:1--blocked:1--isrestart:true--errors:2--exceptions:1\
             --failedasserts:4--passedasserts:5--result:-1--testlog:C:\\logs\\t.log",
        )
        .unwrap();
        assert_eq!(report.watchdog, 1);
        assert!(report.blocked);
        assert!(report.is_restart);
        assert_eq!(report.result, -1);
        assert_eq!(report.testlog, "C:\\logs\\t.log");
        assert_eq!(report.failed_asserts, 4);
    }

    #[test]
    fn test_malformed_report_line_passes_through() {
        let outcome = scan(&[
            "[T](*)Soda Test Report:--testlog:x--result:0--errors:oops",
        ]);
        assert!(
            outcome
                .diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::MalformedReportLine)
        );
        assert_eq!(outcome.result.completeness, LogCompleteness::Truncated);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let outcome = scan(&["garbage", "[T](!)Real error", PASS_REPORT]);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::MalformedLine);
        assert_eq!(outcome.diagnostics[0].line, 1);
        assert_eq!(outcome.issues.get(IssueCategory::Error).len(), 1);
    }

    #[test]
    fn test_missing_report_uses_observed_counts() {
        let outcome = scan(&[
            "[T](*)Assert Passed: 'a'",
            "[T](!)Assert Failed: 'b'",
            "[T](!)Broken",
            "[T](!)Thrown",
            "[T](!)--Exception Backtrace: --x",
        ]);
        let result = &outcome.result;
        assert!(result.is_truncated());
        assert_eq!(result.passed_asserts, 1);
        assert_eq!(result.failed_asserts, 1);
        assert_eq!(result.errors, 1);
        assert_eq!(result.exceptions, 1);
        assert!(result.failed());
    }

    #[test]
    fn test_failed_invariant() {
        let mut result = TestResult::default();
        assert!(result.passed());
        result.blocked = true;
        assert!(result.failed());
        result.blocked = false;
        result.errors = 1;
        assert!(result.failed());
    }

    #[test]
    fn test_failed_with_counts_at_u64_max() {
        let outcome = scan(&[
            "[T](*)Soda Test Report--testlog:x.log--result:-1--isrestart:false\
             --failedasserts:18446744073709551615--exceptions:1--errors:0--blocked:0\
             --passedasserts:0--watchdog:0",
        ]);
        let result = &outcome.result;
        assert_eq!(result.completeness, LogCompleteness::Complete);
        assert_eq!(result.failed_asserts, u64::MAX);
        assert!(result.failed());
        assert!(!result.passed());
    }

    #[test]
    fn test_watchdog_line_counts_toward_fallback() {
        let outcome = scan(&[
            "[T](*)Assert Passed: 'a'",
            "[T](!)Test watchdogged out after: '300' seconds",
        ]);
        let result = &outcome.result;
        assert!(result.is_truncated());
        assert_eq!(result.watchdog, 1);
        assert_eq!(result.errors, 0);
        assert_eq!(result.failed_asserts, 0);
        assert_eq!(
            outcome.issues.get(IssueCategory::Error).len(),
            1,
            "watchdog lines are still filed as errors"
        );
    }

    #[test]
    fn test_process_log_file_missing() {
        let outcome = process_log_file(Path::new("/nonexistent/dir/test.log"));
        assert!(outcome.result.is_unreadable());
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::IoError);
    }

    #[test]
    fn test_process_log_file_crlf() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[T](W)Careful\r\n{PASS_REPORT}\r\n").unwrap();
        let outcome = process_log_file(file.path());
        assert_eq!(outcome.issues.get(IssueCategory::Warning).get("Careful"), Some(&1));
        assert_eq!(outcome.result.completeness, LogCompleteness::Complete);
        assert!(outcome.diagnostics.is_empty());
    }
}
