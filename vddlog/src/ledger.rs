//! Issue ledger: distinct issue strings and how often each was seen.
//!
//! One mapping per [`IssueCategory`]. Ledgers only ever grow during a run and
//! are merged upward (test → suite → run) by summing counts per key, so merge
//! order never changes the result.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::UnknownCategory;

/// Category an issue is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Error,
    Exception,
    Warning,
}

impl IssueCategory {
    /// Every category, in report order.
    pub const ALL: [Self; 3] = [Self::Error, Self::Exception, Self::Warning];

    /// Plural name used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "errors",
            Self::Exception => "exceptions",
            Self::Warning => "warnings",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" | "errors" => Ok(Self::Error),
            "exception" | "exceptions" => Ok(Self::Exception),
            "warning" | "warnings" => Ok(Self::Warning),
            other => Err(UnknownCategory(other.to_owned())),
        }
    }
}

/// Multiset of issue strings per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueLedger {
    errors: BTreeMap<String, u64>,
    exceptions: BTreeMap<String, u64>,
    warnings: BTreeMap<String, u64>,
}

impl IssueLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map_mut(&mut self, category: IssueCategory) -> &mut BTreeMap<String, u64> {
        match category {
            IssueCategory::Error => &mut self.errors,
            IssueCategory::Exception => &mut self.exceptions,
            IssueCategory::Warning => &mut self.warnings,
        }
    }

    /// Count one occurrence of `text` under `category`.
    pub fn record(&mut self, category: IssueCategory, text: impl Into<String>) {
        self.record_with_count(category, text, 1);
    }

    /// Count `n` occurrences of `text` under `category`. Counts saturate at
    /// `u64::MAX`.
    pub fn record_with_count(&mut self, category: IssueCategory, text: impl Into<String>, n: u64) {
        if n == 0 {
            return;
        }
        let count = self.map_mut(category).entry(text.into()).or_insert(0);
        *count = count.saturating_add(n);
    }

    /// Add every entry of `other` to this ledger.
    pub fn merge(&mut self, other: &Self) {
        for category in IssueCategory::ALL {
            for (text, count) in other.get(category) {
                self.record_with_count(category, text.as_str(), *count);
            }
        }
    }

    /// Combine two ledgers into a new one.
    #[must_use]
    pub fn merged(mut self, other: &Self) -> Self {
        self.merge(other);
        self
    }

    /// The full mapping for `category`.
    #[must_use]
    pub fn get(&self, category: IssueCategory) -> &BTreeMap<String, u64> {
        match category {
            IssueCategory::Error => &self.errors,
            IssueCategory::Exception => &self.exceptions,
            IssueCategory::Warning => &self.warnings,
        }
    }

    /// The full mapping for a category given by name.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownCategory`] if `name` is not a recognised category.
    pub fn get_by_name(&self, name: &str) -> Result<&BTreeMap<String, u64>, UnknownCategory> {
        Ok(self.get(name.parse()?))
    }

    /// Entries of `category` sorted by ascending count, ties broken by text.
    #[must_use]
    pub fn sorted(&self, category: IssueCategory) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> = self
            .get(category)
            .iter()
            .map(|(text, count)| (text.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// Sum of all counts in `category`.
    #[must_use]
    pub fn total(&self, category: IssueCategory) -> u64 {
        self.get(category)
            .values()
            .fold(0, |total, count| total.saturating_add(*count))
    }

    /// Whether no issue of any category has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.exceptions.is_empty() && self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ledger(entries: &[(IssueCategory, &str, u64)]) -> IssueLedger {
        let mut ledger = IssueLedger::new();
        for (category, text, count) in entries {
            ledger.record_with_count(*category, *text, *count);
        }
        ledger
    }

    #[test]
    fn test_record_creates_and_increments() {
        let mut ledger = IssueLedger::new();
        ledger.record(IssueCategory::Error, "Failed to find element");
        ledger.record(IssueCategory::Error, "Failed to find element");
        ledger.record(IssueCategory::Warning, "Slow page");

        assert_eq!(ledger.get(IssueCategory::Error)["Failed to find element"], 2);
        assert_eq!(ledger.get(IssueCategory::Warning)["Slow page"], 1);
        assert!(ledger.get(IssueCategory::Exception).is_empty());
    }

    #[test]
    fn test_merge_sums_counts() {
        let mut a = ledger(&[(IssueCategory::Exception, "NoSuchElement", 2)]);
        let b = ledger(&[
            (IssueCategory::Exception, "NoSuchElement", 3),
            (IssueCategory::Error, "Timeout", 1),
        ]);
        a.merge(&b);
        assert_eq!(a.get(IssueCategory::Exception)["NoSuchElement"], 5);
        assert_eq!(a.get(IssueCategory::Error)["Timeout"], 1);
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = ledger(&[
            (IssueCategory::Error, "x", 1),
            (IssueCategory::Warning, "w", 4),
        ]);
        let b = ledger(&[
            (IssueCategory::Error, "x", 2),
            (IssueCategory::Exception, "e", 1),
        ]);
        assert_eq!(a.clone().merged(&b), b.merged(&a));
    }

    #[test]
    fn test_merge_is_associative() {
        let a = ledger(&[(IssueCategory::Error, "x", 1)]);
        let b = ledger(&[(IssueCategory::Error, "x", 2), (IssueCategory::Warning, "w", 1)]);
        let c = ledger(&[(IssueCategory::Warning, "w", 3)]);
        let left = a.clone().merged(&b).merged(&c);
        let right = a.merged(&b.merged(&c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let a = ledger(&[
            (IssueCategory::Exception, "e", 7),
            (IssueCategory::Warning, "w", 1),
        ]);
        let merged = a.clone().merged(&IssueLedger::new());
        assert_eq!(merged, a);
        assert_eq!(IssueLedger::new().merged(&a), a);
    }

    #[test]
    fn test_get_by_name() {
        let a = ledger(&[(IssueCategory::Warning, "w", 1)]);
        assert_eq!(a.get_by_name("warnings").unwrap().len(), 1);
        assert_eq!(a.get_by_name("warning").unwrap().len(), 1);
        assert!(a.get_by_name("errors").unwrap().is_empty());
    }

    #[test]
    fn test_get_by_name_unknown_category() {
        let err = IssueLedger::new().get_by_name("fatal").unwrap_err();
        assert_eq!(err, UnknownCategory("fatal".to_owned()));
    }

    #[test]
    fn test_sorted_ascending_by_count() {
        let a = ledger(&[
            (IssueCategory::Error, "often", 9),
            (IssueCategory::Error, "rare", 1),
            (IssueCategory::Error, "b-mid", 4),
            (IssueCategory::Error, "a-mid", 4),
        ]);
        let sorted = a.sorted(IssueCategory::Error);
        assert_eq!(
            sorted,
            vec![("rare", 1), ("a-mid", 4), ("b-mid", 4), ("often", 9)]
        );
        assert_eq!(a.total(IssueCategory::Error), 18);
    }

    #[test]
    fn test_zero_count_is_not_recorded() {
        let mut a = IssueLedger::new();
        a.record_with_count(IssueCategory::Error, "nothing", 0);
        assert!(a.is_empty());
    }

    #[test]
    fn test_counts_saturate() {
        let mut a = ledger(&[(IssueCategory::Error, "flood", u64::MAX)]);
        a.record(IssueCategory::Error, "flood");
        a.record_with_count(IssueCategory::Error, "other", 3);
        assert_eq!(a.get(IssueCategory::Error)["flood"], u64::MAX);
        assert_eq!(a.total(IssueCategory::Error), u64::MAX);
    }

    fn arb_ledger() -> impl Strategy<Value = IssueLedger> {
        let category = prop::sample::select(IssueCategory::ALL.to_vec());
        prop::collection::vec((category, "[a-c]{1,3}", 1..5u64), 0..10).prop_map(|entries| {
            let mut ledger = IssueLedger::new();
            for (category, text, count) in entries {
                ledger.record_with_count(category, text, count);
            }
            ledger
        })
    }

    proptest! {
        #[test]
        fn prop_merge_commutes(a in arb_ledger(), b in arb_ledger()) {
            prop_assert_eq!(a.clone().merged(&b), b.merged(&a));
        }

        #[test]
        fn prop_merge_associates(a in arb_ledger(), b in arb_ledger(), c in arb_ledger()) {
            let left = a.clone().merged(&b).merged(&c);
            let right = a.merged(&b.merged(&c));
            prop_assert_eq!(left, right);
        }

        #[test]
        fn prop_empty_is_identity(a in arb_ledger()) {
            prop_assert_eq!(a.clone().merged(&IssueLedger::new()), a.clone());
            prop_assert_eq!(IssueLedger::new().merged(&a), a);
        }

        #[test]
        fn prop_merge_adds_totals(a in arb_ledger(), b in arb_ledger()) {
            let merged = a.clone().merged(&b);
            for category in IssueCategory::ALL {
                prop_assert_eq!(merged.total(category), a.total(category) + b.total(category));
            }
        }
    }
}
