//! End-of-run summary.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::filter::discipline_counts;
use crate::model::ElementRecord;
use crate::parser::{IssueKind, Normalized};

/// How many invalid rows to describe individually in the log.
const INVALID_LOGGED: usize = 20;

/// Counts reported after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Valid records after normalization.
    pub accepted: usize,
    pub invalid: usize,
    pub duplicates: usize,
    /// Model elements skipped for lacking a mark.
    pub unmarked: usize,
    /// Records kept after the discipline filter.
    pub selected: usize,
    /// Per-discipline counts of the selected records.
    pub by_discipline: BTreeMap<String, usize>,
}

impl RunSummary {
    #[must_use]
    pub fn new(normalized: &Normalized, unmarked: usize, selected: &[ElementRecord]) -> Self {
        Self {
            accepted: normalized.records.len(),
            invalid: normalized.invalid,
            duplicates: normalized.duplicates,
            unmarked,
            selected: selected.len(),
            by_discipline: discipline_counts(selected),
        }
    }

    #[must_use]
    pub fn has_rejections(&self) -> bool {
        self.invalid > 0 || self.duplicates > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Elements: {} valid", self.accepted)?;
        if self.selected != self.accepted {
            writeln!(f, "Selected: {}", self.selected)?;
        }
        if self.invalid > 0 {
            writeln!(f, "Invalid rows skipped: {}", self.invalid)?;
        }
        if self.duplicates > 0 {
            writeln!(f, "Duplicate marks skipped: {}", self.duplicates)?;
        }
        if self.unmarked > 0 {
            writeln!(f, "Elements without mark: {}", self.unmarked)?;
        }
        writeln!(f, "By discipline:")?;
        let width = self.by_discipline.keys().map(|d| d.chars().count()).max().unwrap_or(0);
        for (discipline, count) in &self.by_discipline {
            writeln!(f, "  {discipline:<width$}  {count:>5}")?;
        }
        Ok(())
    }
}

/// Logs each invalid row, up to a limit. Duplicates are logged by the
/// normalizer itself.
pub fn log_invalid(normalized: &Normalized) {
    let invalid: Vec<_> = normalized
        .issues
        .iter()
        .filter(|issue| matches!(issue.kind, IssueKind::Invalid(_)))
        .collect();
    if invalid.is_empty() {
        return;
    }
    warn!("{} invalid row(s) skipped", invalid.len());
    for issue in invalid.iter().take(INVALID_LOGGED) {
        warn!("  {issue}");
    }
    if invalid.len() > INVALID_LOGGED {
        warn!("  ... and {} more", invalid.len() - INVALID_LOGGED);
    }
}
