//! Run report types.

use serde::Serialize;

use crate::error::Diagnostic;
use crate::ledger::IssueLedger;
use crate::suite::{SuiteSummary, Tally};

/// Whole-run totals.
///
/// Every numeric field is the sum of that field over the run's suites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    #[serde(flatten)]
    pub counts: Tally,
}

impl RunTotals {
    /// Sum the counts of `suites`.
    #[must_use]
    pub fn from_suites(suites: &[SuiteSummary]) -> Self {
        Self {
            counts: suites.iter().map(|suite| &suite.counts).sum(),
        }
    }
}

/// Result of processing a run.
///
/// `diagnostics` lists every data-quality problem met on the way. A
/// non-empty list does not invalidate the totals; it says which inputs they
/// could not cover.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct RunReport {
    /// Number of suite summary files loaded (possibly after repair).
    pub suite_files: usize,
    /// Number of suite summary files skipped as missing or unrecoverable.
    pub failed_files: usize,
    /// Suites sorted by name. Suites sharing a name are all kept.
    pub suites: Vec<SuiteSummary>,
    pub totals: RunTotals,
    /// Run-wide issues: the merge of every suite's ledger.
    #[serde(skip_serializing)]
    pub issues: IssueLedger,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// Assemble a report from aggregated suites.
    #[must_use]
    pub fn new(
        suite_files: usize,
        failed_files: usize,
        mut suites: Vec<SuiteSummary>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        suites.sort_by(|a, b| a.name.cmp(&b.name));

        let totals = RunTotals::from_suites(&suites);
        let issues = suites
            .iter()
            .fold(IssueLedger::new(), |ledger, suite| ledger.merged(&suite.issues));

        Self {
            suite_files,
            failed_files,
            suites,
            totals,
            issues,
            diagnostics,
        }
    }

    /// Whether every input was covered without a data-quality problem.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.failed_files == 0 && self.diagnostics.is_empty()
    }

    /// Total number of suite summary files attempted (loaded + failed).
    #[must_use]
    pub fn files_attempted(&self) -> usize {
        self.suite_files + self.failed_files
    }

    /// Whether any suite was marked truncated.
    #[must_use]
    pub fn any_truncated(&self) -> bool {
        self.suites.iter().any(|suite| suite.truncated)
    }
}
