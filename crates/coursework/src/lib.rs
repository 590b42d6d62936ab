//! Domain core of coursebridge: identities, participants, rosters, and
//! collection of student work between an LMS course and a VCS platform.
//!
//! Infrastructure crates implement the port traits defined here; they never
//! add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no network or
//! archive I/O itself. It reads and writes mapping tables and rosters only
//! through caller-supplied `Read`/`Write` handles.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`LmsId`, `VcsId`, `SubmissionId`, etc.) |
//! | [`types`] | Shared value types (`Assignment`, `SubmissionRecord`, `ParticipantGroup`, etc.) |
//! | [`errors`] | Error taxonomy, warnings, retry policy and back-off |
//! | [`ports`] | `AssignmentGateway` and `Archiver` traits |
//! | [`identity_map`] | Bidirectional LMS/VCS identity map and mapping tables |
//! | [`participants`] | Two-phase participant discovery |
//! | [`roster`] | Roster rendering |
//! | [`collect`] | Archive-and-submit pipeline |
//! | [`report`] | End-of-run summaries |

pub mod collect;
pub mod errors;
pub mod identifiers;
pub mod identity_map;
pub mod participants;
pub mod ports;
pub mod report;
pub mod roster;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use collect::{CollectReport, RepositoryNaming, RepositoryOutcome, SubmissionPipeline};
pub use errors::{
    ArchiveError, Backoff, CollectError, GatewayError, IdentityMapError, ResolveError,
    RetryPolicy, TaskError, Warning,
};
pub use identifiers::{AccountId, AssignmentId, CourseId, GroupId, LmsId, RunId, SubmissionId, VcsId};
pub use identity_map::{
    IdentityMap, IdentityRecord, MappingColumns, MappingTable, DEFAULT_LMS_COLUMN,
    DEFAULT_VCS_COLUMN,
};
pub use participants::{resolve_group, Discovery, DiscoveryOptions, ParticipantResolver, Preparation};
pub use ports::{Archiver, AssignmentGateway};
pub use report::{EntryStatus, Summary, SummaryEntry};
pub use roster::{Roster, DEFAULT_MEMBER_SEPARATOR};
pub use types::{
    ArchiveUploadTask, Assignment, Broadcast, CourseMember, DeliveryFailure, DeliveryReport,
    ParticipantGroup, Recipients, SubmissionFilter, SubmissionGroup, SubmissionRecord, Timestamp,
    UploadReceipt,
};
