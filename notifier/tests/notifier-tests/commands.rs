use crate::helpers::{spawn_app, ADMIN, TODAY};
use od_notifier::commands;
use od_notifier::domain::email_client::ErrorKind;
use std::sync::atomic::Ordering;

fn student(name: &str, regno: &str, section: &str) -> String {
    format!(
        "{},{}@student.college.edu,{},{},Symposium,{}",
        name,
        name.to_lowercase(),
        regno,
        section,
        TODAY
    )
}

#[tokio::test]
async fn validate_passes_for_consistent_files() {
    let app = spawn_app();
    app.write_students(&[&student("Asha", "24CS001", "a")]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    assert_eq!(commands::validate(&app.settings), 0);
    assert_eq!(app.factory.email_client_builds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn validate_fails_on_a_rejected_row() {
    let app = spawn_app();
    app.write_students(&[
        student("Asha", "24CS001", "a"),
        student("Ravi", "23CS002", "a"),
    ]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    assert_eq!(commands::validate(&app.settings), 1);
}

#[tokio::test]
async fn validate_fails_when_a_section_has_no_teacher() {
    let app = spawn_app();
    app.write_students(&[
        &student("Asha", "24CS001", "a"),
        &student("Ravi", "24CS002", "b"),
    ]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    assert_eq!(commands::validate(&app.settings), 1);
}

#[tokio::test]
async fn validate_fails_when_the_students_file_is_missing() {
    let app = spawn_app();
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    assert_eq!(commands::validate(&app.settings), 1);
}

#[tokio::test]
async fn diagnose_succeeds_when_the_provider_answers() {
    let app = spawn_app();
    app.write_students(&[&student("Asha", "24CS001", "a")]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    assert_eq!(commands::diagnose(&app.settings, &app.factory).await, 0);
}

#[tokio::test]
async fn diagnose_fails_without_an_api_key() {
    let mut app = spawn_app();
    app.settings.brevo_api_key = None;
    app.write_students(&[&student("Asha", "24CS001", "a")]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    assert_eq!(commands::diagnose(&app.settings, &app.factory).await, 1);
}

#[tokio::test]
async fn diagnose_fails_when_the_provider_rejects_the_key() {
    let mut app = spawn_app();
    app.factory.account_failure = Some(ErrorKind::AuthenticationError);
    app.write_students(&[&student("Asha", "24CS001", "a")]);
    app.write_teachers(&["Dr. Meena,meena@college.edu,a"]);

    assert_eq!(commands::diagnose(&app.settings, &app.factory).await, 1);
}

#[tokio::test]
async fn check_provider_reports_the_account() {
    let app = spawn_app();

    assert_eq!(commands::check_provider(&app.settings, &app.factory).await, 0);
}

#[tokio::test]
async fn check_provider_fails_when_the_account_cannot_be_read() {
    let mut app = spawn_app();
    app.factory.account_failure = Some(ErrorKind::AuthenticationError);

    assert_eq!(commands::check_provider(&app.settings, &app.factory).await, 1);
}

#[tokio::test]
async fn check_provider_fails_without_a_sender() {
    let mut app = spawn_app();
    app.settings.sender_email = None;

    assert_eq!(commands::check_provider(&app.settings, &app.factory).await, 1);
}

#[tokio::test]
async fn test_email_goes_to_the_admin_by_default() {
    let app = spawn_app();

    let code = commands::test_email(&app.settings, &app.factory, None, false).await;

    assert_eq!(code, 0);
    assert_eq!(app.email_client().sent_to(ADMIN).len(), 1);
}

#[tokio::test]
async fn test_email_honours_an_explicit_recipient() {
    let app = spawn_app();

    let code = commands::test_email(
        &app.settings,
        &app.factory,
        Some("ops@college.edu".to_string()),
        false,
    )
    .await;

    assert_eq!(code, 0);
    assert_eq!(app.email_client().sent_to("ops@college.edu").len(), 1);
    assert!(app.email_client().sent_to(ADMIN).is_empty());
}

#[tokio::test]
async fn test_email_in_dry_run_sends_nothing() {
    let app = spawn_app();

    let code = commands::test_email(&app.settings, &app.factory, None, true).await;

    assert_eq!(code, 0);
    assert!(app.email_client().sent().is_empty());
    assert_eq!(app.factory.email_client_builds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_email_without_any_recipient_fails() {
    let mut app = spawn_app();
    app.settings.admin_email = None;
    app.settings.gmail_user = None;

    let code = commands::test_email(&app.settings, &app.factory, None, false).await;

    assert_eq!(code, 1);
    assert_eq!(app.email_client().calls_to(ADMIN), 0);
}

#[tokio::test]
async fn test_email_fails_when_the_provider_rejects_it() {
    let app = spawn_app();
    app.email_client().always_fail(ErrorKind::AuthenticationError);

    let code = commands::test_email(&app.settings, &app.factory, None, false).await;

    assert_eq!(code, 1);
    assert_eq!(app.email_client().calls_to(ADMIN), 1);
}
