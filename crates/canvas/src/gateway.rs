//! [`AssignmentGateway`] over the Canvas REST API.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use coursework::{
    AccountId, Assignment, AssignmentGateway, AssignmentId, Backoff, CourseId, CourseMember,
    GatewayError, GroupId, LmsId, SubmissionFilter, SubmissionGroup, SubmissionId,
    SubmissionRecord, Timestamp, UploadReceipt,
};
use reqwest::multipart::{Form, Part};
use tracing::{debug, info, instrument, warn};

use crate::client::CanvasClient;
use crate::error::Operation;
use crate::models::{AssignmentDto, FileDto, SubmissionDto, SubmittedDto, UploadSlot, UserDto};
use crate::CanvasError;

/// Canvas access for one course.
#[derive(Debug, Clone)]
pub struct CanvasGateway {
    client: CanvasClient,
    course: CourseId,
}

impl CanvasGateway {
    pub fn new(
        api_base: &str,
        course: CourseId,
        access_token: impl Into<String>,
        backoff: Backoff,
    ) -> Result<Self, CanvasError> {
        Ok(Self {
            client: CanvasClient::new(api_base, access_token, backoff)?,
            course,
        })
    }

    pub fn course(&self) -> CourseId {
        self.course
    }

    fn assignment_path(&self, assignment: AssignmentId) -> String {
        format!("courses/{}/assignments/{}", self.course, assignment)
    }

    fn submissions_path(&self, assignment: AssignmentId) -> String {
        format!("{}/submissions", self.assignment_path(assignment))
    }

    fn user_submission_path(&self, assignment: AssignmentId, user: AccountId) -> String {
        format!("{}/{}", self.submissions_path(assignment), user)
    }

    /// Lists every assignment of the course.
    pub async fn list_assignments(&self) -> Result<Vec<Assignment>, GatewayError> {
        let path = format!("courses/{}/assignments", self.course);
        let dtos: Vec<AssignmentDto> = self
            .client
            .get_paginated(&path, &[], Operation::Course)
            .await?;
        Ok(dtos.into_iter().map(Assignment::from).collect())
    }
}

#[async_trait]
impl AssignmentGateway for CanvasGateway {
    #[instrument(skip(self))]
    async fn assignment(&self, assignment: AssignmentId) -> Result<Assignment, GatewayError> {
        let dto: AssignmentDto = self
            .client
            .get_json(
                &self.assignment_path(assignment),
                &[],
                Operation::Assignment(assignment),
            )
            .await?;
        Ok(dto.into())
    }

    #[instrument(skip(self))]
    async fn list_course_members(&self) -> Result<Vec<CourseMember>, GatewayError> {
        let path = format!("courses/{}/users", self.course);
        let users: Vec<UserDto> = self
            .client
            .get_paginated(&path, &[("enrollment_type[]", "student")], Operation::Course)
            .await?;
        Ok(users.into_iter().map(CourseMember::from).collect())
    }

    #[instrument(skip(self, filter))]
    async fn list_submissions(
        &self,
        assignment: AssignmentId,
        filter: &SubmissionFilter,
    ) -> Result<Vec<SubmissionRecord>, GatewayError> {
        let dtos: Vec<SubmissionDto> = self
            .client
            .get_paginated(
                &self.submissions_path(assignment),
                &[
                    ("include[]", "user"),
                    ("include[]", "group"),
                    ("include[]", "submission_comments"),
                ],
                Operation::Assignment(assignment),
            )
            .await?;
        let student_records = dtos.len();
        let records: Vec<SubmissionRecord> = collapse_submissions(dtos)
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        debug!(
            student_records,
            submissions = records.len(),
            "submissions listed"
        );
        Ok(records)
    }

    #[instrument(skip(self, submission, body), fields(submission_id = %submission.id))]
    async fn post_comment(
        &self,
        assignment: AssignmentId,
        submission: &SubmissionRecord,
        body: &str,
        group_comment: bool,
    ) -> Result<(), GatewayError> {
        let mut form = vec![("comment[text_comment]", body.to_string())];
        if group_comment {
            form.push(("comment[group_comment]", "true".to_string()));
        }
        self.client
            .put_form(
                &self.user_submission_path(assignment, submission.submitter),
                &form,
                Operation::Submission(submission.id),
            )
            .await
    }

    #[instrument(skip(self, submission), fields(submission_id = %submission.id))]
    async fn upload_submission_file(
        &self,
        assignment: AssignmentId,
        submission: &SubmissionRecord,
        file: &Path,
        display_name: &str,
    ) -> Result<UploadReceipt, GatewayError> {
        let operation = Operation::Upload(submission.id);
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| GatewayError::UploadRejected {
                submission: submission.id,
                reason: format!("cannot read {}: {e}", file.display()),
            })?;

        // 1. Ask Canvas where to put the file.
        let slot: UploadSlot = self
            .client
            .post_form(
                &format!(
                    "{}/files",
                    self.user_submission_path(assignment, submission.submitter)
                ),
                &[
                    ("name", display_name.to_string()),
                    ("size", bytes.len().to_string()),
                ],
                operation,
            )
            .await?;

        // 2. Send the bytes; the file part must come after every parameter.
        let mut form = Form::new();
        for (key, value) in slot.upload_params {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            form = form.text(key, value);
        }
        form = form.part(
            "file",
            Part::bytes(bytes).file_name(display_name.to_string()),
        );
        let stored: FileDto = self
            .client
            .post_multipart(&slot.upload_url, form, operation)
            .await?;

        // 3. Submit the stored file on the student's behalf.
        let submitted: SubmittedDto = self
            .client
            .post_form(
                &self.submissions_path(assignment),
                &[
                    ("submission[submission_type]", "online_upload".to_string()),
                    ("submission[file_ids][]", stored.id.to_string()),
                    ("submission[user_id]", submission.submitter.to_string()),
                ],
                operation,
            )
            .await?;

        info!(file_id = stored.id, canvas_submission = submitted.id, "file submitted");
        Ok(UploadReceipt {
            submission: submission.id,
            file_id: stored.id,
            display_name: stored
                .display_name
                .unwrap_or_else(|| display_name.to_string()),
            submitted_at: submitted
                .submitted_at
                .as_deref()
                .and_then(Timestamp::parse_rfc3339),
        })
    }
}

// ---------------------------------------------------------------------------
// Record collapsing
// ---------------------------------------------------------------------------

/// Turns Canvas's per-student submission records into submission entities.
///
/// Records of students in the same group become one [`SubmissionRecord`]
/// addressed through the first member listed. The built-in test student and
/// records without a login are dropped. Comments shared with the whole group
/// appear once.
pub fn collapse_submissions(dtos: Vec<SubmissionDto>) -> Vec<SubmissionRecord> {
    let mut records: Vec<SubmissionRecord> = Vec::new();
    let mut by_group: HashMap<GroupId, usize> = HashMap::new();

    for dto in dtos {
        let Some(user) = dto.user.as_ref() else {
            warn!(canvas_submission = dto.id, "submission listed without its user");
            continue;
        };
        if user.name.as_deref() == Some(CourseMember::TEST_STUDENT_NAME) {
            continue;
        }
        let Some(lms_id) = user.login_id.as_deref().and_then(LmsId::new) else {
            warn!(user_id = dto.user_id, "student has no login id, skipping");
            continue;
        };

        let updated_at = dto.last_activity();
        let group = dto.group.as_ref().and_then(|g| {
            Some(SubmissionGroup {
                id: GroupId::new(g.id?),
                name: g.name.clone().unwrap_or_default(),
            })
        });

        if let Some(group) = &group {
            if let Some(&slot) = by_group.get(&group.id) {
                let record = &mut records[slot];
                record.members.push(lms_id);
                for comment in dto.submission_comments {
                    if !record.has_comment(&comment.comment) {
                        record.comments.push(comment.comment);
                    }
                }
                record.updated_at = record.updated_at.max(updated_at);
                continue;
            }
            by_group.insert(group.id, records.len());
        }

        let mut comments: Vec<String> = Vec::new();
        for comment in dto.submission_comments {
            if !comments.contains(&comment.comment) {
                comments.push(comment.comment);
            }
        }
        records.push(SubmissionRecord {
            id: SubmissionId::new(dto.id),
            submitter: AccountId::new(dto.user_id),
            group,
            members: vec![lms_id],
            comments,
            updated_at,
        });
    }
    records
}
