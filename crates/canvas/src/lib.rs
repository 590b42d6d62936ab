//! Coursebridge Canvas LMS infrastructure adapter.
//!
//! Implements the [`coursework::AssignmentGateway`] port over the Canvas REST
//! API (v1) using [`reqwest`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//! All Canvas API details (pagination, authentication, retry, status codes,
//! per-student submission records) are handled here; the [`coursework`] crate
//! never sees them.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`client`] | Authenticated HTTP client with pagination and read retries |
//! | [`error`] | Adapter setup errors and HTTP status translation |
//! | [`gateway`] | `CanvasGateway`, the `AssignmentGateway` implementation |
//! | [`models`] | Wire DTOs for the Canvas resources in use |
//! | [`url`] | Course URL parsing |

pub mod client;
pub mod error;
pub mod gateway;
pub mod models;
pub mod url;

pub use client::CanvasClient;
pub use error::CanvasError;
pub use gateway::{collapse_submissions, CanvasGateway};
pub use url::{parse_course_url, CourseLocation};
