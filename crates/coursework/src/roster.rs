//! Roster generation: one provisionable group per line.
//!
//! A line lists the group's VCS identities joined by the configured member
//! separator; identities within a line are sorted, so a given group always
//! renders the same way. Line order follows the input order, which the LMS does
//! not keep stable, so consumers should treat the roster as a set of lines.

use std::collections::BTreeSet;
use std::io::Write;

use tracing::warn;

use crate::{ParticipantGroup, VcsId, Warning};

/// Separator used between members of a group when none is configured.
pub const DEFAULT_MEMBER_SEPARATOR: &str = " ";

/// A rendered roster and the groups that could not be put on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    pub lines: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl Roster {
    /// Renders `groups`, skipping (and warning about) groups without any
    /// resolved identity.
    pub fn generate(groups: &[ParticipantGroup], member_separator: &str) -> Self {
        let mut roster = Roster::default();
        for group in groups {
            if group.is_unprovisionable() {
                warn!(submission = %group.submission_id, "group has no mapped members");
                roster.warnings.push(Warning::EmptyGroup {
                    submission: group.submission_id,
                    label: group.label(),
                });
                continue;
            }
            let line = group
                .resolved_vcs_ids
                .iter()
                .map(VcsId::as_str)
                .collect::<Vec<_>>()
                .join(member_separator);
            roster.lines.push(line);
        }
        roster
    }

    /// The roster's lines as a set, for order-insensitive comparison.
    pub fn line_set(&self) -> BTreeSet<&str> {
        self.lines.iter().map(String::as_str).collect()
    }

    /// Writes one line per group, each terminated by a newline.
    pub fn write<W: Write>(&self, mut sink: W) -> std::io::Result<()> {
        for line in &self.lines {
            writeln!(sink, "{line}")?;
        }
        sink.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LmsId, SubmissionId};

    fn group(id: u64, members: &[&str], resolved: &[&str]) -> ParticipantGroup {
        ParticipantGroup {
            submission_id: SubmissionId::new(id),
            group_name: (members.len() > 1).then(|| format!("Group {id}")),
            member_lms_ids: members.iter().map(|m| LmsId::new(*m).unwrap()).collect(),
            resolved_vcs_ids: resolved.iter().map(|v| VcsId::new(*v).unwrap()).collect(),
        }
    }

    #[test]
    fn multi_member_group_is_one_line() {
        let roster = Roster::generate(&[group(1, &["s2", "s1"], &["bob", "alice"])], " ");
        assert_eq!(roster.lines, vec!["alice bob"]);
    }

    #[test]
    fn separator_is_configurable() {
        let roster = Roster::generate(&[group(1, &["s1", "s2"], &["alice", "bob"])], ",");
        assert_eq!(roster.lines, vec!["alice,bob"]);
    }

    #[test]
    fn empty_groups_are_skipped_with_one_warning_each() {
        let groups = vec![
            group(1, &["s1"], &["alice"]),
            group(2, &["s2", "s3"], &[]),
            group(3, &["s4", "s5"], &["dave"]),
        ];
        let roster = Roster::generate(&groups, " ");
        assert_eq!(roster.lines.len(), 2);
        assert_eq!(roster.warnings.len(), 1);
        assert!(matches!(
            roster.warnings[0],
            Warning::EmptyGroup { submission, .. } if submission == SubmissionId::new(2)
        ));
    }

    #[test]
    fn line_set_ignores_group_order() {
        let a = group(1, &["s1"], &["alice"]);
        let b = group(2, &["s2", "s3"], &["bob", "carol"]);
        let forward = Roster::generate(&[a.clone(), b.clone()], " ");
        let backward = Roster::generate(&[b, a], " ");
        assert_ne!(forward.lines, backward.lines);
        assert_eq!(forward.line_set(), backward.line_set());
    }

    #[test]
    fn written_roster_has_one_line_per_group() {
        let roster = Roster::generate(&[group(1, &["s1"], &["alice"]), group(2, &["s2"], &["bob"])], " ");
        let mut out = Vec::new();
        roster.write(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "alice\nbob\n");
    }
}
