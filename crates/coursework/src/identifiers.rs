//! Newtype domain identifiers.
//!
//! Two identity spaces meet in this crate: the learning-management system's
//! accounts and the version-control platform's user names. Both are plain
//! strings on the wire, so each gets its own newtype to make it impossible to
//! hand an [`LmsId`] to a function expecting a [`VcsId`]. LMS-assigned numeric
//! keys get the same treatment.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty
            /// or only whitespace. Surrounding whitespace is trimmed.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else if trimmed.len() == v.len() {
                    Some(Self(v))
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (LMS-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: LMS-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies a course in the learning-management system.
    CourseId
}

u64_id! {
    /// Identifies an assignment within a course.
    AssignmentId
}

u64_id! {
    /// Identifies one submission entity of an assignment.
    ///
    /// Unique per assignment. For a group assignment this is the submission of
    /// the first listed member; all members share it once the LMS has linked
    /// the group.
    SubmissionId
}

u64_id! {
    /// The LMS-internal numeric key of a user account.
    ///
    /// Distinct from [`LmsId`], which is the human-facing login used in the
    /// mapping table. Uploads and comments are addressed by this key.
    AccountId
}

u64_id! {
    /// Identifies a student group within the LMS.
    GroupId
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single command invocation.
///
/// Generated fresh for every CLI invocation; attached to the root span so all
/// activity from a single run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (cross-system identities)
// ---------------------------------------------------------------------------

string_id! {
    /// A student's identity in the learning-management system (its login id).
    ///
    /// This is the forward key of the identity map.
    LmsId
}

string_id! {
    /// A student's identity on the version-control hosting platform.
    VcsId
}
