//! Assignment commands: `prepare-assignment`, `send-message`, and
//! `create-students-file`.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use coursework::{
    AssignmentGateway, AssignmentId, Broadcast, DiscoveryOptions, EntryStatus, IdentityMap,
    ParticipantResolver, Recipients, ResolveError, Roster, SubmissionId, Summary, SummaryEntry,
};
use tracing::info;

use super::{connect, load_identities};
use crate::config::Config;

/// Checks that the assignment is ready for the tool and posts the start
/// message.
pub async fn cmd_prepare_assignment(config: &Config, assignment: AssignmentId) -> Result<Summary> {
    let gateway = connect(config)?;
    // Preparation never resolves identities.
    let identities = IdentityMap::default();
    let resolver = ParticipantResolver::new(&gateway, &identities);

    let preparation = match resolver
        .prepare(assignment, &config.broadcast.message)
        .await
    {
        Ok(preparation) => preparation,
        Err(err @ ResolveError::AssignmentConfiguration { .. }) => {
            println!("[ ] file upload submissions enabled");
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };
    println!(
        "[x] file upload submissions enabled for \"{}\"",
        preparation.assignment.name
    );

    let mut summary = Summary::from_delivery(&preparation.delivery);
    summary.entries.insert(
        0,
        SummaryEntry {
            entity: format!("assignment {}", preparation.assignment.id),
            status: EntryStatus::Succeeded,
        },
    );
    Ok(summary)
}

/// Posts a message on the assignment's submissions.
pub async fn cmd_send_message(
    config: &Config,
    assignment: AssignmentId,
    message: Option<String>,
    submissions: Vec<u64>,
    resend: bool,
) -> Result<Summary> {
    let gateway = connect(config)?;
    let recipients = if submissions.is_empty() {
        Recipients::Everyone
    } else {
        Recipients::Submissions(submissions.into_iter().map(SubmissionId::new).collect())
    };
    let broadcast = Broadcast {
        recipients,
        body: message.unwrap_or_else(|| config.broadcast.message.clone()),
        resend,
    };

    let assignment = gateway.assignment(assignment).await?;
    let report = gateway.broadcast_message(&assignment, &broadcast).await?;
    info!(
        assignment = %assignment.id,
        delivered = report.delivered.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "message sent"
    );
    Ok(Summary::from_delivery(&report))
}

/// Discovers the assignment's participants and writes the roster file.
pub async fn cmd_create_students_file(
    config: &Config,
    assignment: AssignmentId,
    output: Option<PathBuf>,
    include_groupless: bool,
) -> Result<Summary> {
    let identities = load_identities(config)?;
    let gateway = connect(config)?;
    let options = DiscoveryOptions {
        message: config.broadcast.message.clone(),
        include_groupless: include_groupless || config.roster.include_groupless,
    };

    let discovery = ParticipantResolver::new(&gateway, &identities)
        .discover(assignment, &options)
        .await
        .with_context(|| format!("Failed to discover participants of assignment {assignment}"))?;
    let roster = Roster::generate(&discovery.groups, &config.roster.member_separator);

    let path = output.unwrap_or_else(|| config.roster.path.clone());
    let file =
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    roster
        .write(BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), lines = roster.lines.len(), "roster written");

    Ok(Summary::from_roster(&discovery, &roster))
}

