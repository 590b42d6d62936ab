//! Port traits implemented by infrastructure crates.
//!
//! The domain never talks to the LMS or the file system directly; it is handed
//! an [`AssignmentGateway`] and an [`Archiver`] by the composition root. Tests
//! supply in-memory fakes.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    ArchiveError, Assignment, AssignmentId, Broadcast, CourseMember, DeliveryFailure,
    DeliveryReport, GatewayError, SubmissionFilter, SubmissionRecord, Timestamp, UploadReceipt,
};

// ---------------------------------------------------------------------------
// LMS
// ---------------------------------------------------------------------------

/// Resource-oriented access to one course's assignments and submissions.
///
/// Implementations translate every transport failure into [`GatewayError`].
/// Reads may be retried internally according to the error's
/// [`crate::RetryPolicy`]; writes (`post_comment`, `upload_submission_file`)
/// must not be, so a failed write is never duplicated.
#[async_trait]
pub trait AssignmentGateway: Send + Sync {
    /// Loads the configuration of an assignment.
    async fn assignment(&self, assignment: AssignmentId) -> Result<Assignment, GatewayError>;

    /// Returns `true` if the assignment accepts file submissions.
    async fn ensure_upload_enabled(&self, assignment: AssignmentId) -> Result<bool, GatewayError> {
        Ok(self.assignment(assignment).await?.accepts_file_uploads())
    }

    /// Lists the students enrolled in the course.
    async fn list_course_members(&self) -> Result<Vec<CourseMember>, GatewayError>;

    /// Lists submission entities of an assignment that pass `filter`, in LMS
    /// listing order. Group members' records are collapsed into one entity.
    async fn list_submissions(
        &self,
        assignment: AssignmentId,
        filter: &SubmissionFilter,
    ) -> Result<Vec<SubmissionRecord>, GatewayError>;

    /// Attaches a text comment to one submission. With `group_comment` the
    /// LMS shares the comment with every member of the submission's group.
    async fn post_comment(
        &self,
        assignment: AssignmentId,
        submission: &SubmissionRecord,
        body: &str,
        group_comment: bool,
    ) -> Result<(), GatewayError>;

    /// Attaches a local file to a submission and submits it on the
    /// submitter's behalf.
    async fn upload_submission_file(
        &self,
        assignment: AssignmentId,
        submission: &SubmissionRecord,
        file: &Path,
        display_name: &str,
    ) -> Result<UploadReceipt, GatewayError>;

    /// Posts `broadcast` on every targeted submission.
    ///
    /// Submissions already carrying the exact text are skipped unless
    /// `broadcast.resend` is set. A failure to post on one submission is
    /// recorded in the report and does not stop the others; only the initial
    /// listing can fail the whole call.
    async fn broadcast_message(
        &self,
        assignment: &Assignment,
        broadcast: &Broadcast,
    ) -> Result<DeliveryReport, GatewayError> {
        let mut report = DeliveryReport::new(Timestamp::now());
        let targets = self
            .list_submissions(assignment.id, &broadcast.recipients.filter())
            .await?;

        for submission in &targets {
            if !broadcast.resend && submission.has_comment(&broadcast.body) {
                debug!(submission = %submission.id, "message already present, skipping");
                report.skipped.push(submission.id);
                continue;
            }
            match self
                .post_comment(
                    assignment.id,
                    submission,
                    &broadcast.body,
                    assignment.is_group_assignment,
                )
                .await
            {
                Ok(()) => report.delivered.push(submission.id),
                Err(err) => {
                    warn!(submission = %submission.id, error = %err, "message delivery failed");
                    report.failed.push(DeliveryFailure {
                        submission: submission.id,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// File system
// ---------------------------------------------------------------------------

/// Packs a directory tree into a single archive file.
///
/// Implementations must be deterministic: the same directory contents yield
/// byte-identical archives, and version-control metadata is never included.
pub trait Archiver: Send + Sync {
    /// File extension (without the dot) of produced archives, e.g. `zip`.
    fn extension(&self) -> &str;

    /// Writes an archive of `source_dir` to `destination`, creating parent
    /// directories as needed and replacing any existing file.
    fn create_archive(&self, source_dir: &Path, destination: &Path) -> Result<(), ArchiveError>;
}
