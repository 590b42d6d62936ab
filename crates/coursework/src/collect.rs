//! The archive-and-submit pipeline.
//!
//! At collection time each cloned repository is archived and uploaded to the
//! submission of the student (or group) that owns it. Ownership is recovered
//! from the repository's directory name, mapped back to an LMS account through
//! the [`IdentityMap`], and matched against a single fresh submission listing.
//!
//! Repositories are processed sequentially in input order. A failure is pinned
//! on the repository that caused it and never stops the batch; only the upfront
//! upload check can abort the batch, and it does so before any repository is
//! touched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, info_span, warn, Instrument};

use crate::{
    Archiver, ArchiveUploadTask, AssignmentGateway, AssignmentId, CollectError, IdentityMap,
    LmsId, SubmissionFilter, SubmissionRecord, TaskError, UploadReceipt, VcsId,
};

/// Separator the cloning step puts between member names and the template name.
const NAME_SEPARATOR: char = '-';

// ---------------------------------------------------------------------------
// Task planning
// ---------------------------------------------------------------------------

/// How cloned repository directories are named.
///
/// The cloning step names each directory `<owner>-<template>`, where `<owner>`
/// is a VCS identity or, for a group, its members' identities joined by `-`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryNaming {
    /// Template name to strip from the end of directory names, if any.
    pub template_suffix: Option<String>,
}

impl RepositoryNaming {
    /// Derives the owning VCS identity from a repository directory.
    ///
    /// Returns `None` when the path has no usable final component.
    pub fn owner_of(&self, repository: &Path) -> Option<VcsId> {
        let name = repository.file_name()?.to_str()?;
        let owner = match &self.template_suffix {
            Some(suffix) if !suffix.is_empty() => name
                .strip_suffix(suffix.as_str())
                .and_then(|rest| rest.strip_suffix(NAME_SEPARATOR))
                .unwrap_or(name),
            _ => name,
        };
        VcsId::new(owner)
    }

    /// Builds the collection task for one repository.
    pub fn task(&self, repository: &Path, archive_name: &str) -> Option<ArchiveUploadTask> {
        Some(ArchiveUploadTask {
            repository_path: repository.to_path_buf(),
            owner_vcs_id: self.owner_of(repository)?,
            target_submission_id: None,
            archive_name: archive_name.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// What happened to one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOutcome {
    pub task: ArchiveUploadTask,
    pub result: Result<UploadReceipt, TaskError>,
}

/// Per-repository results of one collection batch, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
    pub outcomes: Vec<RepositoryOutcome>,
}

impl CollectReport {
    pub fn receipts(&self) -> impl Iterator<Item = &UploadReceipt> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ArchiveUploadTask, &TaskError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.task, e)))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Archives cloned repositories and uploads them as submissions.
pub struct SubmissionPipeline<'a, G: AssignmentGateway + ?Sized, A: Archiver + ?Sized> {
    gateway: &'a G,
    archiver: &'a A,
    identities: &'a IdentityMap,
    staging_dir: PathBuf,
}

impl<'a, G, A> SubmissionPipeline<'a, G, A>
where
    G: AssignmentGateway + ?Sized,
    A: Archiver + ?Sized,
{
    /// `staging_dir` receives the archives, one subdirectory per owner.
    pub fn new(
        gateway: &'a G,
        archiver: &'a A,
        identities: &'a IdentityMap,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            gateway,
            archiver,
            identities,
            staging_dir: staging_dir.into(),
        }
    }

    /// Processes every task and reports each one's outcome.
    ///
    /// # Errors
    ///
    /// Only batch-level failures: the assignment does not accept uploads, or
    /// the submission listing could not be fetched. Both happen before any
    /// repository is archived.
    pub async fn run(
        &self,
        assignment: AssignmentId,
        tasks: Vec<ArchiveUploadTask>,
    ) -> Result<CollectReport, CollectError> {
        if !self.gateway.ensure_upload_enabled(assignment).await? {
            return Err(CollectError::AssignmentConfiguration {
                assignment,
                reason: "file upload submission is disabled".to_string(),
            });
        }

        let submissions = self
            .gateway
            .list_submissions(assignment, &SubmissionFilter::all())
            .await?;
        let targets = Targets::new(&submissions, self.identities);
        let mut report = CollectReport::default();
        for mut task in tasks {
            let span = info_span!(
                "collect_repository",
                owner = %task.owner_vcs_id,
                path = %task.repository_path.display()
            );
            let result = self
                .process(assignment, &mut task, &targets)
                .instrument(span)
                .await;
            match &result {
                Ok(receipt) => info!(
                    owner = %task.owner_vcs_id,
                    submission = %receipt.submission,
                    "repository submitted"
                ),
                Err(err) => warn!(
                    owner = %task.owner_vcs_id,
                    kind = err.kind(),
                    error = %err,
                    "repository not submitted"
                ),
            }
            report.outcomes.push(RepositoryOutcome { task, result });
        }
        Ok(report)
    }

    async fn process(
        &self,
        assignment: AssignmentId,
        task: &mut ArchiveUploadTask,
        targets: &Targets<'_>,
    ) -> Result<UploadReceipt, TaskError> {
        let submission = match self.identities.resolve_backward(&task.owner_vcs_id) {
            Some(lms_id) => targets
                .of_member(lms_id)
                .ok_or_else(|| TaskError::NoSubmissionForOwner(lms_id.clone()))?,
            None => targets
                .of_group_owner(&task.owner_vcs_id)
                .ok_or_else(|| TaskError::UnresolvedOwner(task.owner_vcs_id.clone()))?,
        };
        task.target_submission_id = Some(submission.id);

        let file_name = format!("{}.{}", task.archive_name, self.archiver.extension());
        let archive = self
            .staging_dir
            .join(task.owner_vcs_id.as_str())
            .join(&file_name);
        self.archiver
            .create_archive(&task.repository_path, &archive)?;

        let receipt = self
            .gateway
            .upload_submission_file(assignment, submission, &archive, &file_name)
            .await?;
        Ok(receipt)
    }
}

// ---------------------------------------------------------------------------
// Owner matching
// ---------------------------------------------------------------------------

/// The submission listing, indexed for owner lookups.
struct Targets<'s> {
    by_member: HashMap<&'s LmsId, &'s SubmissionRecord>,
    /// Submissions with more than one mapped member, with those members'
    /// VCS identities.
    groups: Vec<(&'s SubmissionRecord, Vec<&'s VcsId>)>,
}

impl<'s> Targets<'s> {
    fn new(submissions: &'s [SubmissionRecord], identities: &'s IdentityMap) -> Self {
        let by_member = submissions
            .iter()
            .flat_map(|s| s.members.iter().map(move |m| (m, s)))
            .collect();
        let groups = submissions
            .iter()
            .map(|s| {
                let ids: Vec<&VcsId> = s
                    .members
                    .iter()
                    .filter_map(|m| identities.resolve_forward(m))
                    .flatten()
                    .collect();
                (s, ids)
            })
            .filter(|(_, ids)| ids.len() > 1)
            .collect();
        Self { by_member, groups }
    }

    fn of_member(&self, lms_id: &LmsId) -> Option<&'s SubmissionRecord> {
        self.by_member.get(lms_id).copied()
    }

    /// The one group submission whose mapped members, joined by `-` in any
    /// order, spell `owner`. Hyphens inside usernames make a plain split
    /// ambiguous, so every member must be accounted for.
    fn of_group_owner(&self, owner: &VcsId) -> Option<&'s SubmissionRecord> {
        let mut matching = self
            .groups
            .iter()
            .filter(|(_, ids)| joins_all(owner.as_str(), ids))
            .map(|(s, _)| *s);
        let first = matching.next()?;
        match matching.next() {
            Some(_) => None,
            None => Some(first),
        }
    }
}

/// `true` if `name` is exactly the identities in `ids`, each used once, joined
/// by the name separator.
fn joins_all(name: &str, ids: &[&VcsId]) -> bool {
    ids.iter().enumerate().any(|(i, id)| {
        let Some(rest) = name.strip_prefix(id.as_str()) else {
            return false;
        };
        let others: Vec<&VcsId> = ids
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, other)| *other)
            .collect();
        if others.is_empty() {
            return rest.is_empty();
        }
        rest.strip_prefix(NAME_SEPARATOR)
            .is_some_and(|rest| joins_all(rest, &others))
    })
}
