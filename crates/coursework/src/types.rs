//! Shared value types for the coursework domain.
//!
//! These are the records exchanged across the [`crate::ports::AssignmentGateway`]
//! boundary and the transient entities built from them during discovery and
//! collection. None of them is persisted by this crate.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, AssignmentId, GroupId, LmsId, SubmissionId, VcsId};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an RFC 3339 string such as `2021-03-01T23:59:00Z`.
    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Assignment and course data
// ---------------------------------------------------------------------------

/// Configuration of one LMS assignment, as far as this system cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub name: String,
    /// Submission types the LMS accepts for this assignment (e.g. `online_upload`).
    pub submission_types: Vec<String>,
    /// `true` when the LMS links submissions to student groups.
    pub is_group_assignment: bool,
    pub due_at: Option<Timestamp>,
}

impl Assignment {
    /// Submission type that permits file uploads.
    pub const UPLOAD_SUBMISSION_TYPE: &'static str = "online_upload";

    /// Returns `true` if students (and graders on their behalf) can attach files.
    pub fn accepts_file_uploads(&self) -> bool {
        self.submission_types
            .iter()
            .any(|t| t == Self::UPLOAD_SUBMISSION_TYPE)
    }
}

// ---------------------------------------------------------------------------

/// A student enrolled in the course.
///
/// `fields` holds the public profile fields listed in [`CourseMember::PUBLIC_FIELDS`];
/// absent fields are stored as empty strings so every member exposes the same
/// columns to the mapping wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseMember {
    pub account: AccountId,
    pub fields: BTreeMap<String, String>,
}

impl CourseMember {
    /// Profile fields the LMS exposes for a student, in display order.
    pub const PUBLIC_FIELDS: [&'static str; 7] = [
        "name",
        "sortable_name",
        "short_name",
        "sis_user_id",
        "integration_id",
        "login_id",
        "email",
    ];

    /// Field whose value is the student's [`LmsId`].
    pub const LOGIN_FIELD: &'static str = "login_id";

    /// Display name the LMS gives its built-in preview account.
    pub const TEST_STUDENT_NAME: &'static str = "Test Student";

    /// Returns the field value, or `""` when absent.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    /// Returns the student's login as an [`LmsId`], if present.
    pub fn lms_id(&self) -> Option<LmsId> {
        LmsId::new(self.field(Self::LOGIN_FIELD))
    }

    /// Returns `true` for the LMS's built-in "student view" account.
    pub fn is_test_student(&self) -> bool {
        self.field("name") == Self::TEST_STUDENT_NAME
    }
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

/// The student group a submission is linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionGroup {
    pub id: GroupId,
    pub name: String,
}

/// One submission entity as listed by the LMS.
///
/// Group members' individual records are collapsed by the gateway, so
/// `members` holds every account credited on this submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    /// Account the LMS addresses comments and uploads to.
    pub submitter: AccountId,
    pub group: Option<SubmissionGroup>,
    /// LMS ids of the credited accounts, in listing order. Never empty.
    pub members: Vec<LmsId>,
    /// Text of the comments already attached to the submission.
    pub comments: Vec<String>,
    pub updated_at: Option<Timestamp>,
}

impl SubmissionRecord {
    /// Returns `true` if this submission belongs to a student group.
    pub fn is_group_submission(&self) -> bool {
        self.group.is_some()
    }

    /// Returns `true` if `body` already appears verbatim among the comments.
    pub fn has_comment(&self, body: &str) -> bool {
        self.comments.iter().any(|c| c == body)
    }
}

// ---------------------------------------------------------------------------

/// Narrows a submission listing.
///
/// The default filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionFilter {
    /// Only submissions the LMS reports as updated at or after this instant.
    pub updated_since: Option<Timestamp>,
    /// Only these submissions.
    pub ids: Option<BTreeSet<SubmissionId>>,
}

impl SubmissionFilter {
    /// A filter matching every submission.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter matching only the given submissions.
    pub fn only(ids: impl IntoIterator<Item = SubmissionId>) -> Self {
        Self {
            updated_since: None,
            ids: Some(ids.into_iter().collect()),
        }
    }

    /// Returns `true` if `record` passes every configured criterion.
    ///
    /// A record without an update time never passes an `updated_since` bound.
    pub fn matches(&self, record: &SubmissionRecord) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&record.id) {
                return false;
            }
        }
        match (self.updated_since, record.updated_at) {
            (None, _) => true,
            (Some(since), Some(updated)) => updated >= since,
            (Some(_), None) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Broadcast
// ---------------------------------------------------------------------------

/// Who receives a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Recipients {
    /// Every participating submission of the assignment.
    #[default]
    Everyone,
    /// Only the listed submissions.
    Submissions(BTreeSet<SubmissionId>),
}

impl Recipients {
    /// Returns the listing filter that selects these recipients.
    pub fn filter(&self) -> SubmissionFilter {
        match self {
            Recipients::Everyone => SubmissionFilter::all(),
            Recipients::Submissions(ids) => SubmissionFilter::only(ids.iter().copied()),
        }
    }
}

/// A message to post on submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub recipients: Recipients,
    pub body: String,
    /// Post even where the same text is already present.
    pub resend: bool,
}

impl Broadcast {
    /// Message used when the operator configures none.
    pub const DEFAULT_MESSAGE: &'static str = "This assignment is managed by repobee-canvas.";

    /// Broadcast `body` to everyone, skipping submissions that already carry it.
    pub fn to_everyone(body: impl Into<String>) -> Self {
        Self {
            recipients: Recipients::Everyone,
            body: body.into(),
            resend: false,
        }
    }
}

/// A submission the broadcast could not reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub submission: SubmissionId,
    pub reason: String,
}

/// Per-recipient outcome of a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// When the broadcast started; later listings may filter on it.
    pub started_at: Timestamp,
    pub delivered: Vec<SubmissionId>,
    /// Submissions that already carried the message.
    pub skipped: Vec<SubmissionId>,
    pub failed: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    /// An empty report stamped with `started_at`.
    pub fn new(started_at: Timestamp) -> Self {
        Self {
            started_at,
            delivered: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Number of submissions the broadcast targeted.
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.skipped.len() + self.failed.len()
    }
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Confirmation that a file was attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub submission: SubmissionId,
    /// LMS key of the stored file.
    pub file_id: u64,
    pub display_name: String,
    pub submitted_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Discovery and collection entities
// ---------------------------------------------------------------------------

/// One submission entity of an assignment, with its members resolved to
/// version-control identities.
///
/// Individual and group submissions share this shape; a solo student is a group
/// of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantGroup {
    pub submission_id: SubmissionId,
    /// Name of the LMS group, `None` for an individual submission.
    pub group_name: Option<String>,
    pub member_lms_ids: BTreeSet<LmsId>,
    /// May be smaller than `member_lms_ids` when some members are unmapped.
    pub resolved_vcs_ids: BTreeSet<VcsId>,
}

impl ParticipantGroup {
    /// Returns `true` if the LMS links this submission to a student group.
    pub fn is_group(&self) -> bool {
        self.group_name.is_some()
    }

    /// Returns `true` if no member could be mapped to a VCS identity.
    pub fn is_unprovisionable(&self) -> bool {
        self.resolved_vcs_ids.is_empty()
    }

    /// Human-readable label for reports: the group name or the member list.
    pub fn label(&self) -> String {
        match &self.group_name {
            Some(name) => name.clone(),
            None => self
                .member_lms_ids
                .iter()
                .map(LmsId::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

// ---------------------------------------------------------------------------

/// One pending collection action: archive a cloned repository and upload it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveUploadTask {
    pub repository_path: PathBuf,
    /// VCS identity (or joined group identity) owning the repository.
    pub owner_vcs_id: VcsId,
    /// Filled in once the owner has been resolved to a submission.
    pub target_submission_id: Option<SubmissionId>,
    /// Base name of the archive, without extension.
    pub archive_name: String,
}
