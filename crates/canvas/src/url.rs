//! Course URL parsing.
//!
//! Operators know their course by the address in the browser bar,
//! `https://canvas.example.edu/courses/1234`. The API lives under
//! `/api/v1` on the same origin.

use coursework::CourseId;
use reqwest::Url;

use crate::CanvasError;

/// API path prefix appended to the course origin.
pub const API_PATH: &str = "/api/v1";

/// Where a course lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseLocation {
    /// E.g. `https://canvas.example.edu/api/v1`.
    pub api_base: String,
    pub course_id: CourseId,
}

/// Splits a course URL into API base URL and course id.
///
/// # Errors
///
/// [`CanvasError::InvalidCourseUrl`] unless the URL is absolute, uses HTTP(S),
/// and its path ends in `/courses/<integer>`.
pub fn parse_course_url(input: &str) -> Result<CourseLocation, CanvasError> {
    let invalid = |reason: &str| CanvasError::InvalidCourseUrl {
        url: input.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(input.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    let course_id = match segments.as_slice() {
        [.., "courses", id] => id
            .parse::<u64>()
            .map_err(|_| invalid("course id must be a number"))?,
        _ => return Err(invalid("path must end in /courses/<id>")),
    };

    Ok(CourseLocation {
        api_base: format!("{}{API_PATH}", url.origin().ascii_serialization()),
        course_id: CourseId::new(course_id),
    })
}
