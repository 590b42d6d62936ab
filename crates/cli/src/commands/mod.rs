//! Command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module       | Commands handled                                        |
//! |--------------|---------------------------------------------------------|
//! | `course`     | `InitCourse`, `CreateMapping`                           |
//! | `assignment` | `PrepareAssignment`, `SendMessage`, `CreateStudentsFile` |
//! | `collect`    | `Collect`                                               |
//!
//! Every command returns a [`Summary`]; `main` prints it and derives the exit
//! status from it.

pub mod assignment;
pub mod collect;
pub mod course;

pub use assignment::{cmd_create_students_file, cmd_prepare_assignment, cmd_send_message};
pub use collect::cmd_collect;
pub use course::{cmd_create_mapping, cmd_init_course};

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use canvas::CanvasGateway;
use coursework::{EntryStatus, IdentityMap, Summary, SummaryEntry};
use tracing::info;

use crate::config::Config;

/// Builds the Canvas gateway from validated settings.
pub fn connect(config: &Config) -> Result<CanvasGateway> {
    let settings = config.canvas_settings()?;
    CanvasGateway::new(
        &settings.api_base,
        settings.course_id,
        settings.access_token,
        config.retry.backoff(),
    )
    .with_context(|| format!("Invalid Canvas base URL {}", settings.api_base))
}

/// Loads the configured mapping table.
pub fn load_identities(config: &Config) -> Result<IdentityMap> {
    let path = config.mapping.require_path()?;
    let columns = config.mapping.columns()?;
    let file = File::open(path)
        .with_context(|| format!("Failed to open mapping table {}", path.display()))?;
    let identities = IdentityMap::load(BufReader::new(file), &columns)
        .with_context(|| format!("Failed to load mapping table {}", path.display()))?;
    info!(path = %path.display(), students = identities.len(), "mapping table loaded");
    Ok(identities)
}

/// A one-entry summary for commands that produce a single artefact.
fn single(entity: impl Into<String>, status: EntryStatus) -> Summary {
    Summary {
        entries: vec![SummaryEntry {
            entity: entity.into(),
            status,
        }],
        notes: Vec::new(),
    }
}
