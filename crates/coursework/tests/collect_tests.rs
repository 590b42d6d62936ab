mod support;

use std::path::PathBuf;

use coursework::{
    ArchiveUploadTask, CollectError, RepositoryNaming, SubmissionId, SubmissionPipeline, Summary,
    TaskError,
};
use support::{
    assignment, assignment_id, grouped, identities, individual, FakeArchiver, FakeGateway,
};

fn tasks(names: &[&str]) -> Vec<ArchiveUploadTask> {
    let naming = RepositoryNaming {
        template_suffix: Some("lab1".to_string()),
    };
    names
        .iter()
        .map(|name| {
            naming
                .task(&PathBuf::from("/repos").join(name), "submission")
                .unwrap()
        })
        .collect()
}

#[tokio::test]
async fn missing_submission_fails_only_that_repository() {
    let gateway = FakeGateway::new(
        assignment(true, false),
        vec![
            individual(1, "a"),
            individual(2, "b"),
            individual(3, "c"),
            individual(4, "d"),
        ],
    );
    let map = identities(&[
        ("a", "alice"),
        ("b", "bob"),
        ("c", "carol"),
        ("d", "dave"),
        ("e", "erin"),
    ]);
    let archiver = FakeArchiver::default();
    let staging = tempfile::tempdir().unwrap();

    let report = SubmissionPipeline::new(&gateway, &archiver, &map, staging.path())
        .run(
            assignment_id(),
            tasks(&["alice-lab1", "bob-lab1", "carol-lab1", "dave-lab1", "erin-lab1"]),
        )
        .await
        .unwrap();

    assert_eq!(report.receipts().count(), 4);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0.owner_vcs_id.as_str(), "erin");
    assert!(matches!(failures[0].1, TaskError::NoSubmissionForOwner(_)));
    assert_eq!(gateway.listed(), 1);
    assert_eq!(gateway.uploaded(), 4);
}

#[tokio::test]
async fn disabled_upload_touches_no_repository() {
    let gateway = FakeGateway::new(assignment(false, false), vec![individual(1, "a")]);
    let map = identities(&[("a", "alice")]);
    let archiver = FakeArchiver::default();
    let staging = tempfile::tempdir().unwrap();

    let err = SubmissionPipeline::new(&gateway, &archiver, &map, staging.path())
        .run(assignment_id(), tasks(&["alice-lab1"]))
        .await
        .unwrap_err();

    assert!(matches!(err, CollectError::AssignmentConfiguration { .. }));
    assert!(archiver.created().is_empty());
    assert_eq!(gateway.listed(), 0);
    assert_eq!(gateway.uploaded(), 0);
}

#[tokio::test]
async fn unknown_owner_is_reported_and_the_batch_continues() {
    let gateway = FakeGateway::new(assignment(true, false), vec![individual(1, "a")]);
    let map = identities(&[("a", "alice")]);
    let archiver = FakeArchiver::default();
    let staging = tempfile::tempdir().unwrap();

    let report = SubmissionPipeline::new(&gateway, &archiver, &map, staging.path())
        .run(assignment_id(), tasks(&["mallory-lab1", "alice-lab1"]))
        .await
        .unwrap();

    assert!(matches!(
        report.outcomes[0].result,
        Err(TaskError::UnresolvedOwner(ref owner)) if owner.as_str() == "mallory"
    ));
    assert!(report.outcomes[1].result.is_ok());
}

#[tokio::test]
async fn archive_and_upload_failures_are_per_repository() {
    let gateway = FakeGateway::new(
        assignment(true, false),
        vec![individual(1, "a"), individual(2, "b"), individual(3, "c")],
    );
    gateway.reject_uploads_on(3);
    let map = identities(&[("a", "alice"), ("b", "bob"), ("c", "carol")]);
    let archiver = FakeArchiver::default();
    archiver.fail_on("/repos/bob-lab1");
    let staging = tempfile::tempdir().unwrap();

    let report = SubmissionPipeline::new(&gateway, &archiver, &map, staging.path())
        .run(assignment_id(), tasks(&["alice-lab1", "bob-lab1", "carol-lab1"]))
        .await
        .unwrap();

    let kinds: Vec<&str> = report
        .outcomes
        .iter()
        .map(|o| o.result.as_ref().map_or_else(|e| e.kind(), |_| "ok"))
        .collect();
    assert_eq!(kinds, vec!["ok", "archive_creation", "upload_rejected"]);
    assert_eq!(gateway.uploaded(), 2);

    let summary = Summary::from_collect(&report);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 2);
    assert!(!summary.is_total_failure());
}

#[tokio::test]
async fn group_repository_uploads_to_the_group_submission() {
    let gateway = FakeGateway::new(
        assignment(true, true),
        vec![grouped(10, "Group 1", &["a", "b"])],
    );
    let map = identities(&[("a", "alice"), ("b", "bob")]);
    let archiver = FakeArchiver::default();
    let staging = tempfile::tempdir().unwrap();

    let report = SubmissionPipeline::new(&gateway, &archiver, &map, staging.path())
        .run(assignment_id(), tasks(&["alice-bob-lab1"]))
        .await
        .unwrap();

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.task.target_submission_id, Some(SubmissionId::new(10)));
    let receipt = outcome.result.as_ref().unwrap();
    assert_eq!(receipt.display_name, "submission.zip");
    assert_eq!(
        archiver.created(),
        vec![staging.path().join("alice-bob").join("submission.zip")]
    );
}

#[tokio::test]
async fn hyphenated_name_with_one_known_account_is_not_matched() {
    let gateway = FakeGateway::new(assignment(true, false), vec![individual(1, "a")]);
    let map = identities(&[("a", "ann")]);
    let archiver = FakeArchiver::default();
    let staging = tempfile::tempdir().unwrap();

    let report = SubmissionPipeline::new(&gateway, &archiver, &map, staging.path())
        .run(assignment_id(), tasks(&["ann-lee-lab1"]))
        .await
        .unwrap();

    assert!(matches!(
        report.outcomes[0].result,
        Err(TaskError::UnresolvedOwner(ref owner)) if owner.as_str() == "ann-lee"
    ));
    assert_eq!(report.outcomes[0].task.target_submission_id, None);
    assert!(archiver.created().is_empty());
    assert_eq!(gateway.uploaded(), 0);
}

#[tokio::test]
async fn group_name_must_list_exactly_the_group_members() {
    let gateway = FakeGateway::new(
        assignment(true, true),
        vec![
            grouped(10, "Group 1", &["a", "b"]),
            grouped(11, "Group 2", &["c", "d"]),
        ],
    );
    let map = identities(&[("a", "alice"), ("b", "bob"), ("c", "carol"), ("d", "dan")]);
    let archiver = FakeArchiver::default();
    let staging = tempfile::tempdir().unwrap();

    let report = SubmissionPipeline::new(&gateway, &archiver, &map, staging.path())
        .run(
            assignment_id(),
            tasks(&["alice-carol-lab1", "alice-lab1-extra-lab1", "dan-carol-lab1"]),
        )
        .await
        .unwrap();

    let kinds: Vec<&str> = report
        .outcomes
        .iter()
        .map(|o| o.result.as_ref().map_or_else(|e| e.kind(), |_| "ok"))
        .collect();
    assert_eq!(kinds, vec!["unresolved_owner", "unresolved_owner", "ok"]);
    assert_eq!(
        report.outcomes[2].task.target_submission_id,
        Some(SubmissionId::new(11))
    );
    assert_eq!(gateway.uploaded(), 1);
}

#[tokio::test]
async fn every_repository_failing_is_a_total_failure() {
    let gateway = FakeGateway::new(assignment(true, false), vec![individual(1, "a")]);
    let map = identities(&[("a", "alice")]);
    let archiver = FakeArchiver::default();
    let staging = tempfile::tempdir().unwrap();

    let report = SubmissionPipeline::new(&gateway, &archiver, &map, staging.path())
        .run(assignment_id(), tasks(&["zed-lab1", "yan-lab1"]))
        .await
        .unwrap();

    assert!(Summary::from_collect(&report).is_total_failure());
}
