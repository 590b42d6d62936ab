//! `collect`: archive cloned repositories and submit them to Canvas.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use archive::ZipArchiver;
use coursework::{
    ArchiveUploadTask, AssignmentId, RepositoryNaming, RunId, SubmissionPipeline, Summary,
};
use tracing::{debug, info, warn};

use super::{connect, load_identities};
use crate::config::Config;

pub async fn cmd_collect(
    config: &Config,
    run_id: RunId,
    assignment: AssignmentId,
    repositories: &[PathBuf],
    template: Option<String>,
    archive_name: Option<String>,
) -> Result<Summary> {
    let archive_name = archive_name.unwrap_or_else(|| config.archive.name.clone());
    let naming = RepositoryNaming {
        template_suffix: template,
    };
    let tasks = plan(&naming, repositories, &archive_name)?;

    let identities = load_identities(config)?;
    let gateway = connect(config)?;
    let archiver = ZipArchiver::new(config.archive.exclude.iter().cloned())
        .with_extension(config.archive.extension.clone());
    let staging = config.archive.staging_dir().join(run_id.to_string());
    info!(
        repositories = tasks.len(),
        staging = %staging.display(),
        "collecting repositories"
    );

    let outcome = SubmissionPipeline::new(&gateway, &archiver, &identities, staging.clone())
        .run(assignment, tasks)
        .await;
    discard_staging(&staging);
    let report = outcome.with_context(|| format!("Failed to collect assignment {assignment}"))?;
    Ok(Summary::from_collect(&report))
}

/// Removes a run's staged archives. Failure only costs disk space.
fn discard_staging(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => debug!(staging = %dir.display(), "staging directory removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            staging = %dir.display(),
            error = %err,
            "could not remove staging directory"
        ),
    }
}

/// One task per repository, in the order given.
fn plan(
    naming: &RepositoryNaming,
    repositories: &[PathBuf],
    archive_name: &str,
) -> Result<Vec<ArchiveUploadTask>> {
    repositories
        .iter()
        .map(|path| {
            naming
                .task(path, archive_name)
                .ok_or_else(|| owner_error(path))
        })
        .collect()
}

fn owner_error(path: &Path) -> anyhow::Error {
    anyhow!("cannot derive a repository owner from {}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_follow_input_order_and_strip_the_template() {
        let naming = RepositoryNaming {
            template_suffix: Some("lab1".to_string()),
        };
        let repos = vec![
            PathBuf::from("repos/bob-lab1"),
            PathBuf::from("repos/alice-lab1"),
        ];

        let tasks = plan(&naming, &repos, "submission").unwrap();

        let owners: Vec<&str> = tasks.iter().map(|t| t.owner_vcs_id.as_str()).collect();
        assert_eq!(owners, vec!["bob", "alice"]);
        assert!(tasks.iter().all(|t| t.target_submission_id.is_none()));
        assert_eq!(tasks[0].archive_name, "submission");
    }

    #[test]
    fn staged_archives_are_removed_with_their_run_directory() {
        let root = tempfile::tempdir().unwrap();
        let run = root.path().join("run");
        std::fs::create_dir_all(run.join("alice")).unwrap();
        std::fs::write(run.join("alice").join("submission.zip"), b"zip").unwrap();

        discard_staging(&run);
        discard_staging(&run);

        assert!(!run.exists());
        assert!(root.path().exists());
    }

    #[test]
    fn unusable_path_fails_the_plan() {
        let err = plan(&RepositoryNaming::default(), &[PathBuf::from("/")], "s").unwrap_err();
        assert!(err.to_string().contains("cannot derive a repository owner"));
    }
}
