//! Error and diagnostic types.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// The kind of data-quality problem a diagnostic describes.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[non_exhaustive]
pub enum DiagnosticKind {
    /// An I/O error occurred while reading an input.
    IoError,
    /// A named input (suite file or per-test log) does not exist.
    MissingInput,
    /// A per-test entry is not a regular, visible log file.
    NotALogFile,
    /// A log line does not follow the `[stamp](status)message` grammar.
    MalformedLine,
    /// A test report line that does not carry the full field set.
    MalformedReportLine,
    /// A per-test log ended without a test report line.
    MissingReportLine,
    /// A suite summary element that could not be interpreted.
    MalformedSummary,
    /// Counts in the suite summary disagree with the per-test log.
    CountMismatch,
    /// A suite summary file was truncated and repaired.
    RecoveredTruncation,
    /// A suite summary file could not be parsed even after repair.
    Unrecoverable,
    /// An input is processed with reduced guarantees (e.g. very large file).
    Degraded,
    /// Two suites in the run share the same name.
    DuplicateSuite,
    /// A directory traversal error.
    WalkError,
}

/// A non-fatal problem found while building a report.
///
/// Diagnostics never abort the run; the affected aggregate is skipped or
/// marked truncated and the diagnostic is surfaced alongside the report.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[non_exhaustive]
pub struct Diagnostic {
    /// The file the problem was found in.
    pub file: PathBuf,
    /// Line number (1-indexed) for log lines; 0 otherwise.
    pub line: usize,
    /// The kind of problem.
    pub kind: DiagnosticKind,
    /// Human-readable description of the problem.
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic that is not tied to a line.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: 0,
            kind,
            message: message.into(),
        }
    }

    /// Attach a 1-indexed line number.
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Format the diagnostic for human-readable output.
    #[must_use]
    pub fn format_human_readable(&self) -> String {
        if self.line > 0 {
            format!("{}:{}: [{:?}] {}", self.file.display(), self.line, self.kind, self.message)
        } else {
            format!("{}: [{:?}] {}", self.file.display(), self.kind, self.message)
        }
    }

    /// Emit the diagnostic through `tracing`.
    pub fn trace(&self) {
        match self.kind {
            DiagnosticKind::MalformedLine | DiagnosticKind::RecoveredTruncation => {
                tracing::info!(
                    file = %self.file.display(),
                    line = self.line,
                    kind = ?self.kind,
                    "{}",
                    self.message
                );
            }
            _ => {
                tracing::warn!(
                    file = %self.file.display(),
                    line = self.line,
                    kind = ?self.kind,
                    "{}",
                    self.message
                );
            }
        }
    }
}

/// Trace a diagnostic and keep it.
pub fn emit(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    diagnostic.trace();
    diagnostics.push(diagnostic);
}

/// An issue category name that is not one of `errors`, `exceptions` or
/// `warnings`.
///
/// This is a contract violation by the caller, not a data problem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown issue category '{0}' (expected errors, exceptions or warnings)")]
pub struct UnknownCategory(pub String);

/// Failure to produce a report artifact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OutputError {
    /// The artifact could not be created or written.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The report could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Writing to an in-memory or caller-provided writer failed.
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}
