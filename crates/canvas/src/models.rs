//! Wire DTOs for the Canvas resources this adapter reads.
//!
//! Only the fields in use are declared; Canvas sends many more. Optional
//! fields are `Option` because Canvas omits or nulls them depending on the
//! caller's permissions.

use std::collections::BTreeMap;

use coursework::{AccountId, Assignment, AssignmentId, CourseMember, Timestamp};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentDto {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub submission_types: Vec<String>,
    pub group_category_id: Option<u64>,
    pub due_at: Option<String>,
}

impl From<AssignmentDto> for Assignment {
    fn from(dto: AssignmentDto) -> Self {
        Assignment {
            id: AssignmentId::new(dto.id),
            name: dto.name,
            submission_types: dto.submission_types,
            is_group_assignment: dto.group_category_id.is_some(),
            due_at: dto.due_at.as_deref().and_then(Timestamp::parse_rfc3339),
        }
    }
}

/// A user as embedded in course and submission listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserDto {
    pub id: u64,
    pub name: Option<String>,
    pub sortable_name: Option<String>,
    pub short_name: Option<String>,
    pub sis_user_id: Option<String>,
    pub integration_id: Option<String>,
    pub login_id: Option<String>,
    pub email: Option<String>,
}

impl UserDto {
    fn public_field(&self, name: &str) -> Option<&str> {
        match name {
            "name" => self.name.as_deref(),
            "sortable_name" => self.sortable_name.as_deref(),
            "short_name" => self.short_name.as_deref(),
            "sis_user_id" => self.sis_user_id.as_deref(),
            "integration_id" => self.integration_id.as_deref(),
            "login_id" => self.login_id.as_deref(),
            "email" => self.email.as_deref(),
            _ => None,
        }
    }
}

impl From<UserDto> for CourseMember {
    fn from(dto: UserDto) -> Self {
        let fields: BTreeMap<String, String> = CourseMember::PUBLIC_FIELDS
            .iter()
            .map(|name| {
                let value = dto.public_field(name).unwrap_or("");
                (name.to_string(), value.to_string())
            })
            .collect();
        CourseMember {
            account: AccountId::new(dto.id),
            fields,
        }
    }
}

/// The group a student's submission record is linked to. Both fields are null
/// for a student without a group in a group assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupDto {
    pub id: Option<u64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentDto {
    pub comment: String,
    pub created_at: Option<String>,
}

/// One student's submission record.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionDto {
    pub id: u64,
    pub user_id: u64,
    pub user: Option<UserDto>,
    pub group: Option<GroupDto>,
    #[serde(default)]
    pub submission_comments: Vec<CommentDto>,
    pub submitted_at: Option<String>,
    pub graded_at: Option<String>,
}

impl SubmissionDto {
    /// Latest activity Canvas reports on the record: submission, grading, or
    /// comment.
    pub fn last_activity(&self) -> Option<Timestamp> {
        self.submission_comments
            .iter()
            .filter_map(|c| c.created_at.as_deref())
            .chain(self.submitted_at.as_deref())
            .chain(self.graded_at.as_deref())
            .filter_map(Timestamp::parse_rfc3339)
            .max()
    }
}

/// Step 1 of a file upload: where to send the bytes.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSlot {
    pub upload_url: String,
    #[serde(default)]
    pub upload_params: BTreeMap<String, serde_json::Value>,
}

/// Step 2 of a file upload: the stored file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileDto {
    pub id: u64,
    pub display_name: Option<String>,
}

/// Step 3 of a file upload: the resulting submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedDto {
    pub id: u64,
    pub submitted_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_category_marks_group_assignment() {
        let dto: AssignmentDto = serde_json::from_str(
            r#"{"id":5,"name":"Lab","submission_types":["online_upload"],
                "group_category_id":12,"due_at":"2021-03-01T23:59:00Z","points_possible":10}"#,
        )
        .unwrap();
        let assignment = Assignment::from(dto);
        assert!(assignment.is_group_assignment);
        assert!(assignment.accepts_file_uploads());
        assert!(assignment.due_at.is_some());
    }

    #[test]
    fn member_has_every_public_field() {
        let dto: UserDto =
            serde_json::from_str(r#"{"id":3,"name":"Alice","login_id":"s1"}"#).unwrap();
        let member = CourseMember::from(dto);
        assert_eq!(member.fields.len(), CourseMember::PUBLIC_FIELDS.len());
        assert_eq!(member.field("login_id"), "s1");
        assert_eq!(member.field("email"), "");
    }

    #[test]
    fn last_activity_is_the_latest_timestamp() {
        let dto: SubmissionDto = serde_json::from_str(
            r#"{"id":1,"user_id":2,"submitted_at":"2021-03-01T10:00:00Z",
                "submission_comments":[{"comment":"hi","created_at":"2021-03-02T10:00:00Z"}]}"#,
        )
        .unwrap();
        assert_eq!(
            dto.last_activity(),
            Timestamp::parse_rfc3339("2021-03-02T10:00:00Z")
        );
    }
}
