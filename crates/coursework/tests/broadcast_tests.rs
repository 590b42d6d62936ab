mod support;

use std::collections::BTreeSet;

use coursework::{AssignmentGateway, Broadcast, Recipients, SubmissionId, Summary};
use support::{assignment, grouped, individual, Call, FakeGateway};

#[tokio::test]
async fn repeated_broadcast_skips_submissions_that_already_have_it() {
    let gateway = FakeGateway::new(
        assignment(true, false),
        vec![individual(1, "a"), individual(2, "b")],
    );
    let lab = assignment(true, false);
    let message = Broadcast::to_everyone("Please push before Friday.");

    let first = gateway.broadcast_message(&lab, &message).await.unwrap();
    assert_eq!(first.delivered.len(), 2);

    let second = gateway.broadcast_message(&lab, &message).await.unwrap();
    assert!(second.delivered.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert_eq!(gateway.comments_on(1), vec!["Please push before Friday."]);
}

#[tokio::test]
async fn resend_posts_even_when_present() {
    let gateway = FakeGateway::new(assignment(true, false), vec![individual(1, "a")]);
    let lab = assignment(true, false);
    let mut message = Broadcast::to_everyone("Reminder");
    gateway.broadcast_message(&lab, &message).await.unwrap();

    message.resend = true;
    let report = gateway.broadcast_message(&lab, &message).await.unwrap();

    assert_eq!(report.delivered, vec![SubmissionId::new(1)]);
    assert_eq!(gateway.comments_on(1).len(), 2);
}

#[tokio::test]
async fn explicit_recipients_limit_the_broadcast() {
    let gateway = FakeGateway::new(
        assignment(true, false),
        vec![individual(1, "a"), individual(2, "b"), individual(3, "c")],
    );
    let message = Broadcast {
        recipients: Recipients::Submissions(BTreeSet::from([SubmissionId::new(2)])),
        body: "Only you".to_string(),
        resend: false,
    };

    let report = gateway
        .broadcast_message(&assignment(true, false), &message)
        .await
        .unwrap();

    assert_eq!(report.delivered, vec![SubmissionId::new(2)]);
    assert!(gateway.comments_on(1).is_empty());
    assert!(gateway.comments_on(3).is_empty());
}

#[tokio::test]
async fn one_failed_post_does_not_stop_the_others() {
    let gateway = FakeGateway::new(
        assignment(true, false),
        vec![individual(1, "a"), individual(2, "b"), individual(3, "c")],
    );
    gateway.fail_comments_on(2);

    let report = gateway
        .broadcast_message(&assignment(true, false), &Broadcast::to_everyone("hi"))
        .await
        .unwrap();

    assert_eq!(report.delivered, vec![SubmissionId::new(1), SubmissionId::new(3)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].submission, SubmissionId::new(2));
    assert_eq!(report.attempted(), 3);
    assert!(!Summary::from_delivery(&report).is_total_failure());
}

#[tokio::test]
async fn group_assignments_post_group_comments() {
    let lab = assignment(true, true);
    let gateway = FakeGateway::new(lab.clone(), vec![grouped(1, "Group 1", &["a", "b"])]);

    gateway
        .broadcast_message(&lab, &Broadcast::to_everyone("hi"))
        .await
        .unwrap();

    assert!(gateway.calls().contains(&Call::PostComment {
        submission: SubmissionId::new(1),
        body: "hi".to_string(),
        group_comment: true,
    }));
}
