//! Adapter setup errors and the translation of Canvas HTTP failures into
//! [`GatewayError`].

use std::time::Duration;

use coursework::{AssignmentId, GatewayError, RetryPolicy, SubmissionId};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while setting the adapter up, before any request is made.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// The course URL is not of the form `https://<host>/courses/<id>`.
    #[error("Invalid Canvas course URL '{url}': {reason}")]
    InvalidCourseUrl { url: String, reason: String },

    #[error("Invalid Canvas API base URL '{0}'")]
    InvalidBaseUrl(String),

    /// The HTTP client could not be constructed.
    #[error("Cannot build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Status translation
// ---------------------------------------------------------------------------

/// What a request was about, so a 404 or 4xx can be attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Course-level listing.
    Course,
    Assignment(AssignmentId),
    Submission(SubmissionId),
    /// Any of the three upload steps for a submission.
    Upload(SubmissionId),
}

/// Maps a non-success HTTP status to a [`GatewayError`].
pub fn status_error(
    status: StatusCode,
    retry_after: Option<Duration>,
    detail: &str,
    operation: Operation,
) -> GatewayError {
    let message = if detail.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {detail}")
    };
    match (status.as_u16(), operation) {
        (401 | 403, _) => GatewayError::Unauthorized { message },
        (404, Operation::Assignment(id)) => GatewayError::AssignmentNotFound(id),
        (404, Operation::Submission(id) | Operation::Upload(id)) => {
            GatewayError::SubmissionNotFound(id)
        }
        (400 | 413 | 422, Operation::Upload(submission)) => GatewayError::UploadRejected {
            submission,
            reason: message,
        },
        (429, _) | (500..=599, _) => GatewayError::Transport {
            message,
            retry: RetryPolicy::Retryable { after: retry_after },
        },
        _ => GatewayError::InvalidResponse(message),
    }
}

/// Maps a failure to send or receive a request.
pub fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_decode() {
        return GatewayError::InvalidResponse(err.to_string());
    }
    let retry = if err.is_builder() {
        RetryPolicy::NonRetryable
    } else {
        RetryPolicy::Retryable { after: None }
    };
    GatewayError::Transport {
        message: err.to_string(),
        retry,
    }
}

/// Reads a `Retry-After` header given in seconds. HTTP-date values are ignored.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorMessage>,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

const MAX_DETAIL_CHARS: usize = 200;

/// Extracts a readable message from a Canvas error body.
///
/// Canvas answers `{"errors":[{"message":"..."}]}`; anything else is passed
/// through, truncated.
pub fn error_detail(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if !parsed.errors.is_empty() {
            return parsed
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
        }
    }
    body.trim().chars().take(MAX_DETAIL_CHARS).collect()
}
