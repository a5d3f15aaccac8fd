//! # vddlog
//!
//! Aggregation and recovery pipeline for `VoodooDriver` test runs.
//!
//! The crate turns the raw artifacts of a run (per-test `.log` files and the
//! per-suite summary XML the driver writes) into a validated report:
//!
//! - [`test_log`] classifies log lines and extracts the per-test report line,
//!   telling exceptions from plain errors with one line of lookahead.
//! - [`suite`] rolls per-test results up into a [`SuiteSummary`].
//! - [`summary`] parses suite-summary XML, repairing files that were cut off
//!   when the producing run died.
//! - [`generate_run_report`] drives the whole thing and produces a
//!   [`RunReport`] whose totals are the exact sum of its suites.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use vddlog::{generate_run_report, ReportConfig, RunSource};
//!
//! let source = RunSource::SuiteDir(PathBuf::from("results"));
//! let report = generate_run_report(&source, &ReportConfig::default()).unwrap();
//! println!("Suites: {}", report.suites.len());
//! println!("Passed: {}", report.totals.counts.passed);
//! println!("Diagnostics: {}", report.diagnostics.len());
//! ```

mod config;
mod error;
pub mod ledger;
pub mod lookahead;
pub mod output;
mod report;
mod source;
pub mod suite;
pub mod summary;
pub mod test_log;

pub use config::{DEFAULT_LIBRARY_TOKEN, LibraryPolicy, OutputFormat, ReportConfig, RunSource};
pub use error::{Diagnostic, DiagnosticKind, OutputError, UnknownCategory};
pub use ledger::{IssueCategory, IssueLedger};
pub use report::{RunReport, RunTotals};
pub use suite::{SuiteMeta, SuiteSummary, Tally, TestEntry};
pub use test_log::{TestOutcome, TestResult};

use std::collections::BTreeMap;
use std::path::PathBuf;

use error::emit;
use source::find_suite_files;
use suite::aggregate_suite;
use summary::load_suite_file;

/// Generate the run report for a suite file or a directory of suite files.
///
/// Suite files are processed one at a time in file-name order; within each
/// file, suites are aggregated in document order.
///
/// # Errors
///
/// Returns an error if the named suite file or suite directory does not exist.
/// Everything past that point is data quality: unreadable, truncated or
/// unrecoverable inputs end up in `report.diagnostics` and never abort the run.
pub fn generate_run_report(source: &RunSource, config: &ReportConfig) -> anyhow::Result<RunReport> {
    let (files, mut diagnostics) = match source {
        RunSource::SuiteFile(path) => {
            if !path.is_file() {
                anyhow::bail!("Suite file does not exist: {}", path.display());
            }
            (vec![path.clone()], Vec::new())
        }
        RunSource::SuiteDir(dir) => {
            if !dir.is_dir() {
                anyhow::bail!("Suite directory does not exist: {}", dir.display());
            }
            find_suite_files(dir)
        }
    };

    tracing::info!(files = files.len(), "processing suite summary files");

    let mut suites = Vec::new();
    let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut loaded_files: usize = 0;
    let mut failed_files: usize = 0;

    for file in &files {
        let (suite_file, file_diagnostics) = load_suite_file(file, config);
        diagnostics.extend(file_diagnostics);

        let Some(suite_file) = suite_file else {
            failed_files += 1;
            continue;
        };
        loaded_files += 1;

        for meta in &suite_file.suites {
            tracing::info!(suite = %meta.name, tests = meta.tests.len(), "aggregating suite");
            if let Some(first) = seen.get(&meta.name) {
                emit(
                    &mut diagnostics,
                    Diagnostic::new(
                        file,
                        DiagnosticKind::DuplicateSuite,
                        format!(
                            "Suite '{}' already seen in {}; both are kept in the totals",
                            meta.name,
                            first.display()
                        ),
                    ),
                );
            } else {
                seen.insert(meta.name.clone(), file.clone());
            }

            let suite_report = aggregate_suite(meta, config);
            diagnostics.extend(suite_report.diagnostics);
            suites.push(suite_report.summary);
        }
    }

    Ok(RunReport::new(loaded_files, failed_files, suites, diagnostics))
}
