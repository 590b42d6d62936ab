//! Participant discovery.
//!
//! The LMS only materialises a group's submission entity once something has
//! happened on it, so listing submissions straight away misses groups. Discovery
//! is therefore two-phase: first provoke materialisation by posting a message on
//! every submission, then list. The message post must finish before the listing
//! starts.
//!
//! Members are resolved through the [`IdentityMap`]; an unmapped member costs a
//! warning, never the group.

use tracing::{info, warn};

use crate::{
    Assignment, AssignmentGateway, AssignmentId, Broadcast, DeliveryReport, IdentityMap,
    ParticipantGroup, ResolveError, SubmissionFilter, SubmissionRecord, Warning,
};

/// Knobs for [`ParticipantResolver::discover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Text posted on every submission to trigger materialisation.
    pub message: String,
    /// For group assignments, keep students who belong to no group.
    pub include_groupless: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            message: Broadcast::DEFAULT_MESSAGE.to_string(),
            include_groupless: false,
        }
    }
}

/// Result of the upload check plus the trigger broadcast.
#[derive(Debug, Clone)]
pub struct Preparation {
    pub assignment: Assignment,
    pub delivery: DeliveryReport,
}

/// Everything discovery learned about an assignment.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub assignment: Assignment,
    pub delivery: DeliveryReport,
    /// In LMS listing order.
    pub groups: Vec<ParticipantGroup>,
    pub warnings: Vec<Warning>,
}

/// Discovers which groups take part in an assignment.
///
/// Holds borrowed references only; the gateway and the map are owned by the
/// caller for the duration of one command.
pub struct ParticipantResolver<'a, G: AssignmentGateway + ?Sized> {
    gateway: &'a G,
    identities: &'a IdentityMap,
}

impl<'a, G: AssignmentGateway + ?Sized> ParticipantResolver<'a, G> {
    pub fn new(gateway: &'a G, identities: &'a IdentityMap) -> Self {
        Self {
            gateway,
            identities,
        }
    }

    /// Checks that the assignment accepts uploads, then posts `message` on
    /// every submission that does not already carry it.
    ///
    /// # Errors
    ///
    /// [`ResolveError::AssignmentConfiguration`] when uploads are disabled; in
    /// that case nothing is posted.
    pub async fn prepare(
        &self,
        assignment: AssignmentId,
        message: &str,
    ) -> Result<Preparation, ResolveError> {
        let assignment = self.gateway.assignment(assignment).await?;
        if !assignment.accepts_file_uploads() {
            return Err(ResolveError::AssignmentConfiguration {
                assignment: assignment.id,
                reason: format!(
                    "file upload submission ({}) is disabled",
                    Assignment::UPLOAD_SUBMISSION_TYPE
                ),
            });
        }

        let delivery = self
            .gateway
            .broadcast_message(&assignment, &Broadcast::to_everyone(message))
            .await?;
        info!(
            assignment = %assignment.id,
            delivered = delivery.delivered.len(),
            skipped = delivery.skipped.len(),
            failed = delivery.failed.len(),
            "discovery message posted"
        );
        Ok(Preparation {
            assignment,
            delivery,
        })
    }

    /// Runs the upload check, the trigger broadcast, and the listing, and
    /// resolves every participating group.
    pub async fn discover(
        &self,
        assignment: AssignmentId,
        options: &DiscoveryOptions,
    ) -> Result<Discovery, ResolveError> {
        let Preparation {
            assignment,
            delivery,
        } = self.prepare(assignment, &options.message).await?;

        let mut warnings: Vec<Warning> = delivery
            .failed
            .iter()
            .map(|f| Warning::DeliveryFailed {
                submission: f.submission,
                reason: f.reason.clone(),
            })
            .collect();

        let mut submissions = self
            .gateway
            .list_submissions(assignment.id, &SubmissionFilter::all())
            .await?;

        if assignment.is_group_assignment {
            let grouped = submissions
                .iter()
                .filter(|s| s.is_group_submission())
                .count();
            if grouped == 0 {
                return Err(ResolveError::NoGroupSubmissions(assignment.id));
            }
            let groupless = submissions.len() - grouped;
            if groupless > 0 {
                if options.include_groupless {
                    warnings.push(Warning::GrouplessStudentsIncluded { count: groupless });
                } else {
                    warnings.push(Warning::GrouplessStudentsExcluded { count: groupless });
                    submissions.retain(SubmissionRecord::is_group_submission);
                }
            }
        }

        let groups = submissions
            .iter()
            .map(|s| resolve_group(s, self.identities, &mut warnings))
            .collect();

        Ok(Discovery {
            assignment,
            delivery,
            groups,
            warnings,
        })
    }
}

/// Builds the [`ParticipantGroup`] for one submission, recording an
/// [`Warning::UnmappedIdentity`] for every member the map does not know.
pub fn resolve_group(
    submission: &SubmissionRecord,
    identities: &IdentityMap,
    warnings: &mut Vec<Warning>,
) -> ParticipantGroup {
    let mut group = ParticipantGroup {
        submission_id: submission.id,
        group_name: submission.group.as_ref().map(|g| g.name.clone()),
        member_lms_ids: submission.members.iter().cloned().collect(),
        resolved_vcs_ids: Default::default(),
    };

    for member in &group.member_lms_ids {
        match identities.resolve_forward(member) {
            Some(vcs_ids) => group.resolved_vcs_ids.extend(vcs_ids.iter().cloned()),
            None => {
                warn!(lms_id = %member, submission = %submission.id, "member not in identity map");
                warnings.push(Warning::UnmappedIdentity {
                    lms_id: member.clone(),
                    submission: submission.id,
                });
            }
        }
    }
    group
}
