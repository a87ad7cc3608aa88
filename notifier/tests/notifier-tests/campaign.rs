use crate::helpers::{spawn_app, RecordingEmailClient, StubDomainChecker, ADMIN, TODAY};
use od_notifier::campaign::{Campaign, ReportOutcome, RunMode, RunPhase, DRY_RUN_REASON};
use od_notifier::domain::delivery::DeliveryStatus;
use od_notifier::domain::email_client::ErrorKind;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;

const TEACHER_A: &str = "meena@college.edu";
const TEACHER_B: &str = "arun@college.edu";

fn student(name: &str, regno: &str, section: &str, date: &str) -> String {
    format!(
        "{},{}@student.college.edu,{},{},Hackathon,{}",
        name,
        name.to_lowercase(),
        regno,
        section,
        date
    )
}

#[tokio::test]
async fn sections_without_a_teacher_fail_while_the_others_are_sent() {
    // Arrange
    let app = spawn_app();
    app.write_students(&[
        &student("Asha", "24CS001", "a", TODAY),
        &student("Ravi", "24CS002", "b", TODAY),
        &student("Divya", "24CS003", "A", TODAY),
    ]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    // Act
    let report = app.run_od().await;

    // Assert
    assert_eq!(report.fatal_error, None);
    assert_eq!(report.results.len(), 2);

    let a = &report.results[0];
    assert_eq!(a.recipient_key, "A");
    assert_eq!(a.status, DeliveryStatus::Success);
    assert_eq!(a.affected_count, 2);

    let b = &report.results[1];
    assert_eq!(b.recipient_key, "B");
    assert_eq!(b.status, DeliveryStatus::Failed);
    assert!(b.reason.to_lowercase().contains("no teacher assigned"));

    assert_eq!(report.exit_code(), 1);

    let to_teacher = app.email_client().sent_to(TEACHER_A);
    assert_eq!(to_teacher.len(), 1);
    assert_eq!(
        to_teacher[0].subject,
        format!("OD Notification - Section A - {}", TODAY)
    );
    assert!(to_teacher[0].html.contains("24CS001"));
    assert!(to_teacher[0].html.contains("24CS003"));
    assert!(!to_teacher[0].html.contains("24CS002"));

    let alerts = app.email_client().sent_to(ADMIN);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].subject.starts_with("ALERT"));
    assert!(alerts[0].html.contains("No teacher assigned for this section"));
}

#[tokio::test]
async fn a_day_without_records_sends_only_an_empty_summary() {
    // Arrange
    let app = spawn_app();
    app.write_students(&[
        &student("Asha", "24CS001", "a", "2026-10-18"),
        &student("Ravi", "24CS002", "b", "2026-10-20"),
    ]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    // Act
    let report = app.run_od().await;

    // Assert
    assert_eq!(report.stats.total, 0);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(app.email_client().calls_to(TEACHER_A), 0);

    let sent = app.email_client().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, ADMIN);
    assert!(sent[0].subject.contains("0/0"));
    assert_eq!(
        report.report,
        ReportOutcome::Sent {
            to: ADMIN.to_string()
        }
    );
}

#[tokio::test]
async fn a_missing_api_key_aborts_before_any_file_is_read() {
    // Arrange
    let mut app = spawn_app();
    app.settings.brevo_api_key = None;
    // No CSV files are written: reading them would fail with a load error.

    // Act
    let report = app.run_od().await;

    // Assert
    assert_eq!(report.phase, RunPhase::Configuring);
    let fatal = report.fatal_error.clone().unwrap();
    assert!(fatal.contains("BREVO_API_KEY"), "{}", fatal);
    assert_eq!(report.records_loaded, 0);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(app.factory.email_client_builds.load(Ordering::SeqCst), 0);
    assert!(app.email_client().sent().is_empty());
    assert!(matches!(report.report, ReportOutcome::Skipped(_)));
}

#[tokio::test]
async fn configuration_failures_are_reported_through_gmail_when_available() {
    // Arrange
    let mut app = spawn_app();
    app.settings.brevo_api_key = None;
    let gmail = Arc::new(RecordingEmailClient::default());
    app.factory.report_client = Some(gmail.clone());

    // Act
    let report = app.run_od().await;

    // Assert
    assert_eq!(report.exit_code(), 1);
    let alerts = gmail.sent_to(ADMIN);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].html.contains("BREVO_API_KEY"));
}

#[tokio::test]
async fn a_student_file_without_valid_rows_is_fatal() {
    // Arrange
    let app = spawn_app();
    app.write_students(&[
        "Asha,not-an-email,24CS001,a,Hackathon,2026-10-19",
        "Ravi,ravi@student.college.edu,23CS002,z,Hackathon,2026-10-19",
    ]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    // Act
    let report = app.run_od().await;

    // Assert
    assert_eq!(report.phase, RunPhase::Loading);
    assert_eq!(report.records_rejected, 2);
    assert_eq!(
        report.fatal_error.as_deref(),
        Some("No valid student records found")
    );
    assert_eq!(report.exit_code(), 1);
    assert_eq!(app.email_client().calls_to(TEACHER_A), 0);

    let alerts = app.email_client().sent_to(ADMIN);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].subject.starts_with("ALERT"));
}

#[tokio::test]
async fn an_unreadable_teacher_file_is_fatal() {
    // Arrange
    let app = spawn_app();
    app.write_students(&[&student("Asha", "24CS001", "a", TODAY)]);

    // Act
    let report = app.run_od().await;

    // Assert
    assert_eq!(report.phase, RunPhase::Loading);
    assert!(report
        .fatal_error
        .as_deref()
        .is_some_and(|e| e.contains("teachers.csv")));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn the_quota_caps_the_number_of_emails_per_run() {
    // Arrange
    let mut app = spawn_app();
    app.settings.max_email_quota = Some(1);
    app.write_students(&[
        &student("Asha", "24CS001", "a", TODAY),
        &student("Ravi", "24CS002", "b", TODAY),
    ]);
    app.write_teachers(&[
        "Dr. Meena,meena@college.edu,a",
        "Prof. Arun,arun@college.edu,b",
    ]);

    // Act
    let report = app.run_od().await;

    // Assert
    assert_eq!(report.results[0].status, DeliveryStatus::Success);
    assert_eq!(report.results[1].status, DeliveryStatus::Failed);
    assert_eq!(
        report.results[1].reason,
        "Email quota exceeded (1 emails per run)"
    );
    assert_eq!(app.email_client().calls_to(TEACHER_B), 0);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn an_authentication_error_stops_all_remaining_sends() {
    // Arrange
    let app = spawn_app();
    app.email_client().always_fail(ErrorKind::AuthenticationError);
    app.write_students(&[
        &student("Asha", "24CS001", "a", TODAY),
        &student("Ravi", "24CS002", "b", TODAY),
    ]);
    app.write_teachers(&[
        "Dr. Meena,meena@college.edu,a",
        "Prof. Arun,arun@college.edu,b",
    ]);

    // Act
    let report = app.run_od().await;

    // Assert
    assert_eq!(app.email_client().calls_to(TEACHER_A), 1);
    assert_eq!(app.email_client().calls_to(TEACHER_B), 0);
    assert!(report
        .results
        .iter()
        .all(|r| r.error_kind == Some(ErrorKind::AuthenticationError)));
    assert!(report.results[1].reason.starts_with("Skipped"));
    assert_eq!(report.exit_code(), 1);
    // The report goes through the same rejected key, so it fails too.
    assert!(matches!(report.report, ReportOutcome::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_until_the_send_succeeds() {
    // Arrange
    let app = spawn_app();
    app.email_client().fail_then_succeed(
        TEACHER_A,
        vec![ErrorKind::NetworkError, ErrorKind::ApiLimitExceeded],
    );
    app.write_students(&[&student("Asha", "24CS001", "a", TODAY)]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    // Act
    let report = app.run_od().await;

    // Assert
    assert_eq!(app.email_client().calls_to(TEACHER_A), 3);
    assert_eq!(report.results[0].status, DeliveryStatus::Success);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_keep_the_classified_kind() {
    // Arrange
    let app = spawn_app();
    app.email_client().fail_then_succeed(
        TEACHER_A,
        vec![
            ErrorKind::ValidationError,
            ErrorKind::ValidationError,
            ErrorKind::ValidationError,
        ],
    );
    app.write_students(&[&student("Asha", "24CS001", "a", TODAY)]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    // Act
    let report = app.run_od().await;

    // Assert
    assert_eq!(app.email_client().calls_to(TEACHER_A), 3);
    assert_eq!(
        report.results[0].error_kind,
        Some(ErrorKind::ValidationError)
    );
    let alert = &app.email_client().sent_to(ADMIN)[0];
    assert!(alert.html.contains(ErrorKind::ValidationError.as_str()));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn domains_without_mx_records_are_not_sent_to() {
    // Arrange
    let mut app = spawn_app();
    app.factory.domain_checker = Some(Arc::new(StubDomainChecker(HashSet::from([
        "college.edu".to_string(),
    ]))));
    app.write_students(&[&student("Asha", "24CS001", "a", TODAY)]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    // Act
    let report = app.run_od().await;

    // Assert
    assert_eq!(app.email_client().calls_to(TEACHER_A), 0);
    assert_eq!(
        report.results[0].reason,
        "Domain 'college.edu' not found (MX record lookup failed)"
    );
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn a_dry_run_renders_everything_and_sends_nothing() {
    // Arrange
    let app = spawn_app();
    app.write_students(&[
        &student("Asha", "24CS001", "a", TODAY),
        &student("Ravi", "24CS002", "b", TODAY),
    ]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    // Act
    let report = app.run(Campaign::OdNotifications, RunMode::DryRun).await;

    // Assert
    assert!(app.email_client().sent().is_empty());
    assert_eq!(report.results[0].reason, DRY_RUN_REASON);
    assert_eq!(report.results[0].status, DeliveryStatus::Success);
    assert_eq!(report.results[1].status, DeliveryStatus::Failed);
    assert_eq!(report.report, ReportOutcome::Logged);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn the_digest_campaign_sends_one_update_per_subscriber() {
    // Arrange
    let app = spawn_app();
    app.write_subscribers(&[
        "Priya,priya@example.org,2026-09-01,CSE,events,,",
        "Vikram,Vikram@Example.org,,,,Hostel C,",
        "Priya again,PRIYA@example.org,2026-09-02,,,,",
        "No Email,,2026-09-01,,,,",
    ]);

    // Act
    let report = app.run(Campaign::SubscriberDigest, RunMode::Live).await;

    // Assert
    assert_eq!(report.records_rejected, 1);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].affected_count, 2);
    assert_eq!(app.email_client().sent_to("priya@example.org").len(), 1);
    assert_eq!(app.email_client().sent_to("vikram@example.org").len(), 1);
    assert!(app
        .email_client()
        .sent_to("vikram@example.org")[0]
        .html
        .contains("Hostel C"));
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn without_an_admin_address_the_report_is_skipped() {
    // Arrange
    let mut app = spawn_app();
    app.settings.admin_email = None;
    app.write_students(&[&student("Asha", "24CS001", "a", TODAY)]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    // Act
    let report = app.run_od().await;

    // Assert
    assert!(matches!(report.report, ReportOutcome::Skipped(_)));
    assert_eq!(app.email_client().sent().len(), 1);
    assert_eq!(report.exit_code(), 0);
}
