//! End-of-run summaries and the exit-status rule.
//!
//! A command fails outright (non-zero exit) only on a precondition error, which
//! callers see as an `Err` before a summary exists, or when every attempted
//! item failed. Partial success is still success.

use std::fmt;

use crate::{CollectReport, DeliveryReport, Discovery, Roster, Warning};

/// How one entity fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Succeeded,
    /// Processed, but with a caveat the operator should look at.
    Partial(String),
    Failed(String),
}

/// One line of a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    pub entity: String,
    pub status: EntryStatus,
}

/// Outcome of a command across all entities it touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub entries: Vec<SummaryEntry>,
    /// Findings not tied to a single entry.
    pub notes: Vec<String>,
}

impl Summary {
    fn push(&mut self, entity: impl Into<String>, status: EntryStatus) {
        self.entries.push(SummaryEntry {
            entity: entity.into(),
            status,
        });
    }

    /// Summarises a broadcast: one entry per targeted submission.
    pub fn from_delivery(report: &DeliveryReport) -> Self {
        let mut summary = Summary::default();
        for id in &report.delivered {
            summary.push(format!("submission {id}"), EntryStatus::Succeeded);
        }
        for id in &report.skipped {
            summary.push(
                format!("submission {id}"),
                EntryStatus::Partial("message already present".to_string()),
            );
        }
        for failure in &report.failed {
            summary.push(
                format!("submission {}", failure.submission),
                EntryStatus::Failed(failure.reason.clone()),
            );
        }
        summary
    }

    /// Summarises discovery plus roster generation: one entry per group.
    pub fn from_roster(discovery: &Discovery, roster: &Roster) -> Self {
        let mut summary = Summary::default();
        let warnings: Vec<&Warning> = discovery.warnings.iter().chain(&roster.warnings).collect();

        for group in &discovery.groups {
            let unmapped: Vec<String> = warnings
                .iter()
                .filter_map(|w| match w {
                    Warning::UnmappedIdentity { lms_id, submission }
                        if *submission == group.submission_id =>
                    {
                        Some(lms_id.to_string())
                    }
                    _ => None,
                })
                .collect();
            let status = if group.is_unprovisionable() {
                EntryStatus::Failed("no member is mapped to a VCS identity".to_string())
            } else if unmapped.is_empty() {
                EntryStatus::Succeeded
            } else {
                EntryStatus::Partial(format!("unmapped: {}", unmapped.join(", ")))
            };
            summary.push(group.label(), status);
        }

        summary.notes = warnings
            .iter()
            .filter(|w| {
                !matches!(
                    w,
                    Warning::UnmappedIdentity { .. } | Warning::EmptyGroup { .. }
                )
            })
            .map(|w| w.to_string())
            .collect();
        summary
    }

    /// Summarises a collection batch: one entry per repository.
    pub fn from_collect(report: &CollectReport) -> Self {
        let mut summary = Summary::default();
        for outcome in &report.outcomes {
            let entity = outcome.task.repository_path.display().to_string();
            let status = match &outcome.result {
                Ok(_) => EntryStatus::Succeeded,
                Err(err) => EntryStatus::Failed(format!("{}: {err}", err.kind())),
            };
            summary.push(entity, status);
        }
        summary
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Succeeded))
    }

    pub fn partial(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Partial(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Failed(_)))
    }

    fn count(&self, predicate: impl Fn(&EntryStatus) -> bool) -> usize {
        self.entries.iter().filter(|e| predicate(&e.status)).count()
    }

    /// `true` when at least one item was attempted and none succeeded even
    /// partially.
    pub fn is_total_failure(&self) -> bool {
        !self.entries.is_empty() && self.failed() == self.entries.len()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match &entry.status {
                EntryStatus::Succeeded => writeln!(f, "  ok       {}", entry.entity)?,
                EntryStatus::Partial(why) => writeln!(f, "  partial  {} ({why})", entry.entity)?,
                EntryStatus::Failed(why) => writeln!(f, "  failed   {} ({why})", entry.entity)?,
            }
        }
        for note in &self.notes {
            writeln!(f, "  note     {note}")?;
        }
        write!(
            f,
            "{} succeeded, {} partial, {} failed",
            self.succeeded(),
            self.partial(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeliveryFailure, SubmissionId, Timestamp};

    fn delivery(delivered: &[u64], failed: &[u64]) -> DeliveryReport {
        let mut report = DeliveryReport::new(Timestamp::now());
        report.delivered = delivered.iter().map(|i| SubmissionId::new(*i)).collect();
        report.failed = failed
            .iter()
            .map(|i| DeliveryFailure {
                submission: SubmissionId::new(*i),
                reason: "timeout".to_string(),
            })
            .collect();
        report
    }

    #[test]
    fn partial_failure_is_not_total_failure() {
        let summary = Summary::from_delivery(&delivery(&[1, 2], &[3]));
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.is_total_failure());
    }

    #[test]
    fn all_failed_is_total_failure() {
        let summary = Summary::from_delivery(&delivery(&[], &[1, 2]));
        assert!(summary.is_total_failure());
    }

    #[test]
    fn empty_summary_is_not_a_failure() {
        assert!(!Summary::default().is_total_failure());
    }

    #[test]
    fn display_ends_with_totals() {
        let summary = Summary::from_delivery(&delivery(&[1], &[2]));
        let text = summary.to_string();
        assert!(text.contains("failed   submission 2 (timeout)"));
        assert!(text.ends_with("1 succeeded, 0 partial, 1 failed"));
    }
}
