//! The non-campaign CLI commands. Each returns the process exit code.

use crate::campaign::ServiceFactory;
use crate::configuration::{RecipientSource, Settings};
use crate::csv_loader::{self, LoadReport};
use crate::diagnostics::{
    date_distribution, env_presence, preflight, provider_status, section_coverage,
    ProviderStatus,
};
use crate::domain::records::{Record, Student, Subscriber, Teacher};
use crate::retry::{send_with_retry, RetryPolicy};
use crate::templates;
use std::path::Path;

fn load_or_report<R: Record>(path: &Path) -> Option<LoadReport<R>> {
    match csv_loader::load_blocking::<R>(path) {
        Ok(report) => {
            println!(
                "{}: {} valid, {} rejected ({})",
                R::KIND.as_str(),
                report.records.len(),
                report.rejected.len(),
                path.display()
            );
            for rejected in &report.rejected {
                println!("  {}", rejected);
            }
            Some(report)
        }
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, error.message = %e, "Failed to load CSV");
            println!("{}: cannot be read ({})", R::KIND.as_str(), path.display());
            None
        }
    }
}

/// Check every input file and the cross-file consistency of the OD data.
#[tracing::instrument(name = "Validating data files", skip(settings))]
pub fn validate(settings: &Settings) -> i32 {
    let students = load_or_report::<Student>(&settings.students_csv);
    let teachers = match settings.recipient_source {
        RecipientSource::Csv => load_or_report::<Teacher>(&settings.teachers_csv),
        RecipientSource::Dynamodb => None,
    };
    let subscribers = if settings.subscribers_csv.exists() {
        load_or_report::<Subscriber>(&settings.subscribers_csv)
    } else {
        None
    };

    let mut clean = students
        .as_ref()
        .is_some_and(|s| s.rejected.is_empty() && !s.is_empty());

    if let Some(subscribers) = &subscribers {
        clean &= subscribers.rejected.is_empty();
    }

    if let (Some(students), Some(teachers)) = (&students, &teachers) {
        clean &= teachers.rejected.is_empty() && !teachers.is_empty();
        let report = preflight(&students.records, &teachers.records);
        for regno in &report.duplicate_regnos {
            println!("Duplicate registration number: {}", regno);
        }
        for section in &report.duplicate_teacher_sections {
            println!("Section {} has more than one teacher", section.to_uppercase());
        }
        for section in &report.sections_without_teacher {
            println!("Section {} has no teacher", section.to_uppercase());
        }
        clean &= report.is_clean();
    }

    println!("{}", if clean { "Validation passed" } else { "Validation found problems" });
    if clean {
        0
    } else {
        1
    }
}

/// Print configuration presence, data statistics and provider connectivity.
#[tracing::instrument(name = "Running diagnostics", skip(settings, factory))]
pub async fn diagnose(settings: &Settings, factory: &dyn ServiceFactory) -> i32 {
    println!("Environment");
    for var in env_presence(settings) {
        println!("  {:<20} {}", var.name, if var.present { "set" } else { "missing" });
    }
    println!("  {:<20} {}", "APP_TIMEZONE", settings.app_timezone);
    println!("  {:<20} {}", "SEND_TIME", settings.send_time());
    println!("  {:<20} {}", "MAX_EMAIL_QUOTA", settings.quota());

    let students = load_or_report::<Student>(&settings.students_csv);
    let teachers = load_or_report::<Teacher>(&settings.teachers_csv);

    if let Some(students) = &students {
        println!("Dates");
        for (date, count) in date_distribution(&students.records) {
            println!("  {} {}", date, count);
        }
    }
    if let (Some(students), Some(teachers)) = (&students, &teachers) {
        let coverage = section_coverage(&students.records, &teachers.records);
        println!("Sections with a teacher: {}", coverage.covered.join(", "));
        println!("Sections without a teacher: {}", coverage.uncovered.join(", "));
    }

    let delivery = match settings.delivery() {
        Ok(delivery) => delivery,
        Err(e) => {
            println!("Configuration: {}", e);
            return 1;
        }
    };
    let probe = factory.account_probe(&delivery);
    match provider_status(probe.as_deref()).await {
        ProviderStatus::Connected(account) => {
            println!("Brevo: connected as {}", account.email);
            0
        }
        ProviderStatus::Failed { kind, message } => {
            println!("Brevo: {} ({})", message, kind);
            println!("  {}", kind.suggestion());
            1
        }
        ProviderStatus::NotChecked => {
            println!("Brevo: not checked");
            1
        }
    }
}

/// Verify the API key and show the account's plan and credits.
#[tracing::instrument(name = "Checking email provider", skip(settings, factory))]
pub async fn check_provider(settings: &Settings, factory: &dyn ServiceFactory) -> i32 {
    let delivery = match settings.delivery() {
        Ok(delivery) => delivery,
        Err(e) => {
            println!("Configuration: {}", e);
            return 1;
        }
    };
    let probe = factory.account_probe(&delivery);
    match provider_status(probe.as_deref()).await {
        ProviderStatus::Connected(account) => {
            println!("Account:  {}", account.email);
            println!("Company:  {}", account.company.as_deref().unwrap_or("-"));
            println!("Plan:     {}", account.plan.as_deref().unwrap_or("-"));
            println!(
                "Credits:  {}",
                account
                    .credits
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            0
        }
        ProviderStatus::Failed { kind, message } => {
            println!("Brevo rejected the check: {} ({})", message, kind);
            println!("Suggestion: {}", kind.suggestion());
            println!("Action: {}", kind.action());
            1
        }
        ProviderStatus::NotChecked => 1,
    }
}

/// Send one test email, to `to` or else the admin address.
#[tracing::instrument(name = "Sending test email", skip(settings, factory))]
pub async fn test_email(
    settings: &Settings,
    factory: &dyn ServiceFactory,
    to: Option<String>,
    dry_run: bool,
) -> i32 {
    let delivery = match settings.delivery() {
        Ok(delivery) => delivery,
        Err(e) => {
            println!("Configuration: {}", e);
            return 1;
        }
    };
    let Some(recipient) = to.or_else(|| settings.admin_recipient()) else {
        println!("No recipient: pass --to or set ADMIN_EMAIL");
        return 1;
    };

    let email = templates::provider_test_email(
        delivery.sender.as_ref(),
        &chrono::Utc::now().to_rfc3339(),
    );
    if dry_run {
        println!("Dry run: would send '{}' to {}", email.subject, recipient);
        return 0;
    }

    let client = match factory.email_client(&delivery) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, error.message = %e, "Failed to build email client");
            return 1;
        }
    };
    let policy = RetryPolicy::with_inter_send_delay(std::time::Duration::ZERO);
    match send_with_retry(client.as_ref(), &recipient, &email.subject, &email.html, &policy).await {
        Ok(attempts) => {
            println!("Test email sent to {} after {} attempt(s)", recipient, attempts);
            0
        }
        Err(e) => {
            println!("Test email failed: {}", e);
            println!("Suggestion: {}", e.kind.suggestion());
            1
        }
    }
}
