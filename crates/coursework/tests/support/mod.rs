//! In-memory gateway and archiver shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use coursework::{
    AccountId, ArchiveError, Archiver, Assignment, AssignmentGateway, AssignmentId, CourseMember,
    GatewayError, GroupId, IdentityMap, LmsId, MappingColumns, SubmissionFilter, SubmissionGroup,
    SubmissionId, SubmissionRecord, Timestamp, UploadReceipt,
};

/// One call made against [`FakeGateway`], in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Assignment,
    ListMembers,
    ListSubmissions,
    PostComment {
        submission: SubmissionId,
        body: String,
        group_comment: bool,
    },
    Upload {
        submission: SubmissionId,
        display_name: String,
    },
}

/// In-memory LMS for one assignment. Not durable, but good for scenario tests.
pub struct FakeGateway {
    assignment: Assignment,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    members: Vec<CourseMember>,
    submissions: Vec<SubmissionRecord>,
    calls: Vec<Call>,
    failing_comments: BTreeSet<SubmissionId>,
    rejected_uploads: BTreeSet<SubmissionId>,
    next_file_id: u64,
}

impl FakeGateway {
    pub fn new(assignment: Assignment, submissions: Vec<SubmissionRecord>) -> Self {
        Self {
            assignment,
            inner: Mutex::new(Inner {
                submissions,
                next_file_id: 1000,
                ..Inner::default()
            }),
        }
    }

    pub fn with_members(self, members: Vec<CourseMember>) -> Self {
        self.inner.lock().unwrap().members = members;
        self
    }

    /// Makes every comment post on `submission` fail.
    pub fn fail_comments_on(&self, submission: u64) {
        self.inner
            .lock()
            .unwrap()
            .failing_comments
            .insert(SubmissionId::new(submission));
    }

    /// Makes every upload to `submission` get rejected.
    pub fn reject_uploads_on(&self, submission: u64) {
        self.inner
            .lock()
            .unwrap()
            .rejected_uploads
            .insert(SubmissionId::new(submission));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    pub fn posted(&self) -> usize {
        self.count(|c| matches!(c, Call::PostComment { .. }))
    }

    pub fn listed(&self) -> usize {
        self.count(|c| matches!(c, Call::ListSubmissions))
    }

    pub fn uploaded(&self) -> usize {
        self.count(|c| matches!(c, Call::Upload { .. }))
    }

    pub fn comments_on(&self, submission: u64) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .submissions
            .iter()
            .find(|s| s.id == SubmissionId::new(submission))
            .map(|s| s.comments.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AssignmentGateway for FakeGateway {
    async fn assignment(&self, assignment: AssignmentId) -> Result<Assignment, GatewayError> {
        self.inner.lock().unwrap().calls.push(Call::Assignment);
        if assignment != self.assignment.id {
            return Err(GatewayError::AssignmentNotFound(assignment));
        }
        Ok(self.assignment.clone())
    }

    async fn list_course_members(&self) -> Result<Vec<CourseMember>, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::ListMembers);
        Ok(inner.members.clone())
    }

    async fn list_submissions(
        &self,
        assignment: AssignmentId,
        filter: &SubmissionFilter,
    ) -> Result<Vec<SubmissionRecord>, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::ListSubmissions);
        if assignment != self.assignment.id {
            return Err(GatewayError::AssignmentNotFound(assignment));
        }
        Ok(inner
            .submissions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn post_comment(
        &self,
        _assignment: AssignmentId,
        submission: &SubmissionRecord,
        body: &str,
        group_comment: bool,
    ) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::PostComment {
            submission: submission.id,
            body: body.to_string(),
            group_comment,
        });
        if inner.failing_comments.contains(&submission.id) {
            return Err(GatewayError::Transport {
                message: "connection reset".to_string(),
                retry: coursework::RetryPolicy::Retryable { after: None },
            });
        }
        let stored = inner
            .submissions
            .iter_mut()
            .find(|s| s.id == submission.id)
            .ok_or(GatewayError::SubmissionNotFound(submission.id))?;
        stored.comments.push(body.to_string());
        Ok(())
    }

    async fn upload_submission_file(
        &self,
        _assignment: AssignmentId,
        submission: &SubmissionRecord,
        file: &Path,
        display_name: &str,
    ) -> Result<UploadReceipt, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Upload {
            submission: submission.id,
            display_name: display_name.to_string(),
        });
        if inner.rejected_uploads.contains(&submission.id) {
            return Err(GatewayError::UploadRejected {
                submission: submission.id,
                reason: "file too large".to_string(),
            });
        }
        if !file.is_file() {
            return Err(GatewayError::InvalidResponse(format!(
                "no file at {}",
                file.display()
            )));
        }
        inner.next_file_id += 1;
        Ok(UploadReceipt {
            submission: submission.id,
            file_id: inner.next_file_id,
            display_name: display_name.to_string(),
            submitted_at: Some(Timestamp::now()),
        })
    }
}

// ---------------------------------------------------------------------------

/// Archiver writing a small marker file instead of a real archive.
#[derive(Default)]
pub struct FakeArchiver {
    failing: Mutex<BTreeSet<PathBuf>>,
    created: Mutex<Vec<PathBuf>>,
}

impl FakeArchiver {
    pub fn fail_on(&self, source: impl Into<PathBuf>) {
        self.failing.lock().unwrap().insert(source.into());
    }

    pub fn created(&self) -> Vec<PathBuf> {
        self.created.lock().unwrap().clone()
    }
}

impl Archiver for FakeArchiver {
    fn extension(&self) -> &str {
        "zip"
    }

    fn create_archive(&self, source_dir: &Path, destination: &Path) -> Result<(), ArchiveError> {
        if self.failing.lock().unwrap().contains(source_dir) {
            return Err(ArchiveError {
                path: source_dir.to_path_buf(),
                message: "permission denied".to_string(),
            });
        }
        let io_error = |e: std::io::Error| ArchiveError {
            path: destination.to_path_buf(),
            message: e.to_string(),
        };
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(destination, source_dir.display().to_string()).map_err(io_error)?;
        self.created.lock().unwrap().push(destination.to_path_buf());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub const ASSIGNMENT: u64 = 7;

pub fn assignment_id() -> AssignmentId {
    AssignmentId::new(ASSIGNMENT)
}

pub fn assignment(upload_enabled: bool, group: bool) -> Assignment {
    let mut submission_types = vec!["online_text_entry".to_string()];
    if upload_enabled {
        submission_types.push("online_upload".to_string());
    }
    Assignment {
        id: assignment_id(),
        name: "Lab 1".to_string(),
        submission_types,
        is_group_assignment: group,
        due_at: None,
    }
}

pub fn lms(id: &str) -> LmsId {
    LmsId::new(id).unwrap()
}

/// A submission of a single student.
pub fn individual(id: u64, student: &str) -> SubmissionRecord {
    SubmissionRecord {
        id: SubmissionId::new(id),
        submitter: AccountId::new(id + 500),
        group: None,
        members: vec![lms(student)],
        comments: Vec::new(),
        updated_at: None,
    }
}

/// A submission shared by a student group.
pub fn grouped(id: u64, name: &str, students: &[&str]) -> SubmissionRecord {
    SubmissionRecord {
        id: SubmissionId::new(id),
        submitter: AccountId::new(id + 500),
        group: Some(SubmissionGroup {
            id: GroupId::new(id + 900),
            name: name.to_string(),
        }),
        members: students.iter().map(|s| lms(s)).collect(),
        comments: Vec::new(),
        updated_at: None,
    }
}

/// Loads an identity map from `(lms, vcs)` pairs.
pub fn identities(pairs: &[(&str, &str)]) -> IdentityMap {
    let mut text = String::from("canvas_id,git_id\n");
    for (lms, vcs) in pairs {
        text.push_str(&format!("{lms},{vcs}\n"));
    }
    IdentityMap::load(text.as_bytes(), &MappingColumns::default()).unwrap()
}
