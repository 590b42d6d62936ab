//! Error taxonomy, warnings, and retry-policy types for the coursework domain.
//!
//! Errors are split by blast radius:
//!
//! - **Precondition** errors ([`IdentityMapError`], [`ResolveError`],
//!   [`CollectError`]) abort a command before any remote state changes.
//! - **Per-entity** errors ([`TaskError`]) fail one repository; the batch continues.
//! - **Warnings** ([`Warning`]) are recorded and reported but change nothing.
//!
//! Transport failures never cross the gateway boundary raw: adapters translate
//! them into [`GatewayError`], which carries a [`RetryPolicy`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AssignmentId, LmsId, SubmissionId, VcsId};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Only idempotent reads consult this. Writes (comments, uploads) are never
/// retried automatically; a failed write is reported for that entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt, e.g. from `Retry-After`.
        /// `None` means apply the caller's own schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

/// Bounded exponential back-off schedule for idempotent reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backoff {
    /// Total attempts including the first. At least 1.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl Backoff {
    /// A schedule that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based), or `None`
    /// once the attempt budget is spent.
    ///
    /// The delay doubles per attempt and is capped at `max_delay`; a server
    /// supplied minimum in `policy` raises it. Non-retryable policies yield `None`.
    pub fn delay_after(&self, attempt: u32, policy: &RetryPolicy) -> Option<Duration> {
        let RetryPolicy::Retryable { after } = policy else {
            return None;
        };
        if attempt >= self.max_attempts.max(1) {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let scheduled = self
            .initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        Some(after.map_or(scheduled, |min| scheduled.max(min)))
    }
}

// ---------------------------------------------------------------------------
// Identity map
// ---------------------------------------------------------------------------

/// Errors raised while loading a mapping table. All are fatal preconditions.
#[derive(Debug, Error)]
pub enum IdentityMapError {
    /// The table lacks a required column.
    #[error("Mapping table has no column '{column}' (found: {})", found.join(", "))]
    MalformedMapping {
        /// The configured column name that is missing.
        column: String,
        /// Header columns actually present.
        found: Vec<String>,
    },

    /// A row could not be parsed as delimited text.
    #[error("Mapping table row {row} is malformed: {message}")]
    MalformedRow { row: u64, message: String },

    /// A required identity cell is blank.
    #[error("Mapping table row {row} has an empty {column} value")]
    EmptyIdentity { row: u64, column: String },

    /// A key repeats with conflicting data.
    #[error("Mapping table row {row}: {column} '{value}' is not unique")]
    DuplicateIdentity {
        row: u64,
        column: String,
        value: String,
    },

    /// The table could not be read or written.
    #[error("Mapping table I/O failed: {0}")]
    Io(#[source] std::io::Error),
}

// ---------------------------------------------------------------------------
// Gateway boundary
// ---------------------------------------------------------------------------

/// Failures reported by an [`crate::ports::AssignmentGateway`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure, rate limit, or server error.
    #[error("LMS transport failure: {message}")]
    Transport { message: String, retry: RetryPolicy },

    /// The credential was rejected.
    #[error("LMS rejected the access token: {message}")]
    Unauthorized { message: String },

    #[error("Assignment {0} not found")]
    AssignmentNotFound(AssignmentId),

    #[error("Submission {0} not found")]
    SubmissionNotFound(SubmissionId),

    /// The LMS refused the file (type, size, or assignment state).
    #[error("Upload to submission {submission} rejected: {reason}")]
    UploadRejected {
        submission: SubmissionId,
        reason: String,
    },

    /// The LMS answered with something the adapter cannot interpret.
    #[error("Unexpected LMS response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Returns whether repeating the failed call may succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            GatewayError::Transport { retry, .. } => retry.clone(),
            _ => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Participant resolver
// ---------------------------------------------------------------------------

/// Errors that abort participant discovery.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The assignment cannot receive file uploads.
    #[error("Assignment {assignment} is not configured correctly: {reason}")]
    AssignmentConfiguration {
        assignment: AssignmentId,
        reason: String,
    },

    /// A group assignment listed no group submissions at all.
    #[error(
        "No group submissions found for group assignment {0}; \
         run prepare-assignment first or configure it as an individual assignment"
    )]
    NoGroupSubmissions(AssignmentId),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

// ---------------------------------------------------------------------------
// Archive-and-submit pipeline
// ---------------------------------------------------------------------------

/// Failure to build an archive, reported by an [`crate::ports::Archiver`].
#[derive(Debug, Error)]
#[error("Cannot archive {}: {message}", path.display())]
pub struct ArchiveError {
    pub path: PathBuf,
    pub message: String,
}

/// Errors that abort a whole collection batch before any repository is touched.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Assignment {assignment} is not configured correctly: {reason}")]
    AssignmentConfiguration {
        assignment: AssignmentId,
        reason: String,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Failure of a single repository's archive-and-submit task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("No LMS account is mapped to VCS identity '{0}'")]
    UnresolvedOwner(VcsId),

    #[error("LMS account '{0}' has no submission for this assignment")]
    NoSubmissionForOwner(LmsId),

    #[error("Archive creation failed for {}: {message}", path.display())]
    ArchiveCreation { path: PathBuf, message: String },

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Submission {0} not found")]
    SubmissionNotFound(SubmissionId),

    #[error("Transport failure: {0}")]
    Transport(String),
}

impl TaskError {
    /// Short machine-friendly name of the failure kind, used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::UnresolvedOwner(_) => "unresolved_owner",
            TaskError::NoSubmissionForOwner(_) => "no_submission_for_owner",
            TaskError::ArchiveCreation { .. } => "archive_creation",
            TaskError::UploadRejected(_) => "upload_rejected",
            TaskError::SubmissionNotFound(_) => "submission_not_found",
            TaskError::Transport(_) => "transport",
        }
    }
}

impl From<ArchiveError> for TaskError {
    fn from(err: ArchiveError) -> Self {
        TaskError::ArchiveCreation {
            path: err.path,
            message: err.message,
        }
    }
}

impl From<GatewayError> for TaskError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::UploadRejected { reason, .. } => TaskError::UploadRejected(reason),
            GatewayError::SubmissionNotFound(id) => TaskError::SubmissionNotFound(id),
            other => TaskError::Transport(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Non-fatal findings accumulated while a command runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    /// A submission member has no row in the mapping table.
    UnmappedIdentity {
        lms_id: LmsId,
        submission: SubmissionId,
    },
    /// A group has no mapped member and cannot be provisioned.
    EmptyGroup { submission: SubmissionId, label: String },
    /// Groupless students in a group assignment were left out of the roster.
    GrouplessStudentsExcluded { count: usize },
    /// Groupless students in a group assignment were kept in the roster.
    GrouplessStudentsIncluded { count: usize },
    /// The broadcast did not reach a submission.
    DeliveryFailed {
        submission: SubmissionId,
        reason: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnmappedIdentity { lms_id, submission } => write!(
                f,
                "LMS account '{lms_id}' (submission {submission}) is not mapped to a VCS identity"
            ),
            Warning::EmptyGroup { submission, label } => write!(
                f,
                "submission {submission} ({label}) has no mapped members and is left out of the roster"
            ),
            Warning::GrouplessStudentsExcluded { count } => write!(
                f,
                "{count} student(s) are not assigned to a group and are NOT included; \
                 use --include-groupless to include them"
            ),
            Warning::GrouplessStudentsIncluded { count } => write!(
                f,
                "{count} student(s) are not assigned to a group and are included individually"
            ),
            Warning::DeliveryFailed { submission, reason } => {
                write!(f, "message not delivered to submission {submission}: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let backoff = Backoff {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        };
        let retry = RetryPolicy::Retryable { after: None };
        assert_eq!(backoff.delay_after(1, &retry), Some(Duration::from_millis(100)));
        assert_eq!(backoff.delay_after(2, &retry), Some(Duration::from_millis(200)));
        assert_eq!(backoff.delay_after(3, &retry), Some(Duration::from_millis(300)));
        assert_eq!(backoff.delay_after(5, &retry), None);
    }

    #[test]
    fn backoff_honours_server_minimum() {
        let backoff = Backoff::default();
        let retry = RetryPolicy::Retryable {
            after: Some(Duration::from_secs(2)),
        };
        assert_eq!(backoff.delay_after(1, &retry), Some(Duration::from_secs(2)));
    }

    #[test]
    fn non_retryable_errors_never_wait() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay_after(1, &RetryPolicy::NonRetryable), None);
        assert!(backoff
            .delay_after(1, &RetryPolicy::Retryable { after: None })
            .is_some());
        assert_eq!(
            Backoff::none().delay_after(1, &RetryPolicy::Retryable { after: None }),
            None
        );
    }

    #[test]
    fn only_transport_errors_are_retryable() {
        let transport = GatewayError::Transport {
            message: "503".to_string(),
            retry: RetryPolicy::Retryable { after: None },
        };
        assert!(transport.retry_policy().is_retryable());
        assert!(!GatewayError::SubmissionNotFound(SubmissionId::new(1))
            .retry_policy()
            .is_retryable());
    }

    #[test]
    fn gateway_errors_translate_into_task_errors() {
        let rejected = GatewayError::UploadRejected {
            submission: SubmissionId::new(3),
            reason: "file too large".to_string(),
        };
        assert_eq!(
            TaskError::from(rejected),
            TaskError::UploadRejected("file too large".to_string())
        );
        let auth = GatewayError::Unauthorized {
            message: "expired".to_string(),
        };
        assert_eq!(TaskError::from(auth).kind(), "transport");
    }

    #[test]
    fn malformed_mapping_names_the_missing_column() {
        let err = IdentityMapError::MalformedMapping {
            column: "git_id".to_string(),
            found: vec!["canvas_id".to_string(), "email".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Mapping table has no column 'git_id' (found: canvas_id, email)"
        );
    }
}
