use crate::diagnostics::{DiagnosticSnapshot, ProviderStatus};
use crate::domain::delivery::{DeliveryResult, RunStats};
use crate::domain::records::{Student, Subscriber};
use crate::utils::escape_html;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

const STYLE: &str = "font-family: Arial, sans-serif; color: #222; max-width: 720px;";
const TABLE_STYLE: &str = "border-collapse: collapse; width: 100%;";
const CELL_STYLE: &str = "border: 1px solid #ccc; padding: 6px 10px; text-align: left;";

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>{title}</title></head><body style="{STYLE}">{body}<p style="color:#888;font-size:12px;">This is an automated message. Please do not reply.</p></body></html>"#,
        title = escape_html(title),
    )
}

fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let head: String = headers
        .iter()
        .map(|h| format!(r#"<th style="{CELL_STYLE} background:#f2f2f2;">{}</th>"#, escape_html(h)))
        .collect();
    let body: String = rows
        .iter()
        .map(|row| {
            let cells: String = row
                .iter()
                .map(|c| format!(r#"<td style="{CELL_STYLE}">{}</td>"#, escape_html(c)))
                .collect();
            format!("<tr>{}</tr>", cells)
        })
        .collect();
    format!(r#"<table style="{TABLE_STYLE}"><thead><tr>{head}</tr></thead><tbody>{body}</tbody></table>"#)
}

/// The daily OD list sent to the teacher of one section.
pub fn od_notification(
    teacher_name: &str,
    section: &str,
    date: &str,
    students: &[Student],
) -> RenderedEmail {
    let section = section.to_uppercase();
    let subject = format!("OD Notification - Section {} - {}", section, date);

    let rows: Vec<Vec<String>> = students
        .iter()
        .enumerate()
        .map(|(i, s)| {
            vec![
                (i + 1).to_string(),
                s.name.clone(),
                s.regno.clone(),
                s.event.clone(),
            ]
        })
        .collect();

    let body = format!(
        "<h2>OD Notification</h2>\
         <p>Dear {teacher},</p>\
         <p>The following {count} student(s) of Section {section} are on duty on {date}:</p>\
         {table}\
         <p>Regards,<br>OD Notification System</p>",
        teacher = escape_html(teacher_name),
        count = students.len(),
        section = escape_html(&section),
        date = escape_html(date),
        table = table(&["S.No", "Name", "Reg. No", "Event"], &rows),
    );

    RenderedEmail {
        html: page(&subject, &body),
        subject,
    }
}

pub fn subscriber_update(subscriber: &Subscriber, date: &str) -> RenderedEmail {
    let subject = format!("Daily Update - {}", date);

    let mut extras = String::new();
    for field in [&subscriber.custom_field_1, &subscriber.custom_field_2] {
        if !field.is_empty() {
            extras.push_str(&format!("<li>{}</li>", escape_html(field)));
        }
    }
    if !extras.is_empty() {
        extras = format!("<ul>{}</ul>", extras);
    }

    let body = format!(
        "<h2>Your daily update</h2>\
         <p>Hello {name},</p>\
         <p>Here is today's update for the {department} department, tailored to your \
         <strong>{preferences}</strong> preferences.</p>\
         {extras}\
         <p>You have been subscribed since {since}.</p>",
        name = escape_html(&subscriber.name),
        department = escape_html(&subscriber.department),
        preferences = escape_html(&subscriber.preferences),
        since = escape_html(&subscriber.subscribed_date),
    );

    RenderedEmail {
        html: page(&subject, &body),
        subject,
    }
}

/// What the admin report needs to know about a run.
#[derive(Debug, Clone, Copy)]
pub struct ReportView<'a> {
    pub campaign: &'a str,
    pub date: &'a str,
    pub dry_run: bool,
    pub stats: &'a RunStats,
    pub results: &'a [DeliveryResult],
    pub records_loaded: usize,
    pub records_rejected: usize,
    pub fatal_error: Option<&'a str>,
}

fn stats_table(view: &ReportView<'_>) -> String {
    let rows = vec![
        vec!["Campaign".to_string(), view.campaign.to_string()],
        vec!["Date".to_string(), view.date.to_string()],
        vec![
            "Mode".to_string(),
            if view.dry_run { "dry run" } else { "live" }.to_string(),
        ],
        vec!["Records loaded".to_string(), view.records_loaded.to_string()],
        vec!["Rows rejected".to_string(), view.records_rejected.to_string()],
        vec!["Recipients".to_string(), view.stats.total.to_string()],
        vec!["Successful".to_string(), view.stats.success.to_string()],
        vec!["Failed".to_string(), view.stats.failed.to_string()],
        vec![
            "Execution time".to_string(),
            format!("{:.1}s", view.stats.execution_time.as_secs_f64()),
        ],
    ];
    table(&["Metric", "Value"], &rows)
}

fn results_table(results: &[DeliveryResult]) -> String {
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            vec![
                r.recipient_key.clone(),
                r.recipient_name.clone(),
                r.email.clone(),
                r.affected_count.to_string(),
                r.status.as_str().to_string(),
                r.reason.clone(),
            ]
        })
        .collect();
    table(
        &["Key", "Recipient", "Email", "Records", "Status", "Reason"],
        &rows,
    )
}

pub fn admin_summary(view: &ReportView<'_>) -> RenderedEmail {
    let subject = format!(
        "{} Summary - {} - {}/{} sent",
        view.campaign, view.date, view.stats.success, view.stats.total
    );

    let details = if view.results.is_empty() {
        "<p>No emails were due today.</p>".to_string()
    } else {
        results_table(view.results)
    };

    let body = format!(
        "<h2>Run summary</h2>{stats}<h3>Deliveries</h3>{details}",
        stats = stats_table(view),
    );

    RenderedEmail {
        html: page(&subject, &body),
        subject,
    }
}

pub fn error_alert(view: &ReportView<'_>, snapshot: &DiagnosticSnapshot) -> RenderedEmail {
    let subject = match view.fatal_error {
        Some(_) => format!("ALERT: {} run failed - {}", view.campaign, view.date),
        None => format!(
            "ALERT: {} - {} of {} emails failed - {}",
            view.campaign, view.stats.failed, view.stats.total, view.date
        ),
    };

    let mut body = String::from("<h2 style=\"color:#b00020;\">Run needs attention</h2>");

    if let Some(error) = view.fatal_error {
        body.push_str(&format!(
            "<p><strong>Fatal error:</strong> {}</p>",
            escape_html(error)
        ));
    }

    if let Some(kind) = view.stats.dominant_error_kind() {
        body.push_str(&format!(
            "<h3>Error type: {}</h3><p><strong>Suggestion:</strong> {}</p><p><strong>Action:</strong> {}</p>",
            kind.as_str(),
            escape_html(kind.suggestion()),
            escape_html(kind.action()),
        ));
    }

    body.push_str("<h3>Run</h3>");
    body.push_str(&stats_table(view));

    if !view.stats.failures.is_empty() {
        body.push_str("<h3>Failed deliveries</h3>");
        body.push_str(&results_table(&view.stats.failures));
    }

    body.push_str("<h3>Diagnostics</h3>");
    body.push_str(&diagnostics_section(snapshot));

    RenderedEmail {
        html: page(&subject, &body),
        subject,
    }
}

fn diagnostics_section(snapshot: &DiagnosticSnapshot) -> String {
    let env_rows: Vec<Vec<String>> = snapshot
        .env
        .iter()
        .map(|e| {
            vec![
                e.name.to_string(),
                if e.present { "set" } else { "missing" }.to_string(),
            ]
        })
        .collect();

    let count_rows: Vec<Vec<String>> = snapshot
        .record_counts
        .iter()
        .map(|(name, count)| vec![name.clone(), count.to_string()])
        .collect();

    let provider = match &snapshot.provider {
        ProviderStatus::Connected(account) => format!(
            "Connected as {} ({} plan, {} credits)",
            account.email,
            account.plan.as_deref().unwrap_or("unknown"),
            account
                .credits
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        ),
        ProviderStatus::Failed { kind, message } => {
            format!("Unreachable: {} ({})", message, kind.as_str())
        }
        ProviderStatus::NotChecked => "Not checked".to_string(),
    };

    format!(
        "{env}{counts}<p><strong>Provider:</strong> {provider}</p><p><strong>Timezone:</strong> {tz}</p>",
        env = table(&["Variable", "Status"], &env_rows),
        counts = table(&["Data", "Count"], &count_rows),
        provider = escape_html(&provider),
        tz = escape_html(&snapshot.timezone),
    )
}

pub fn provider_test_email(sender: &str, sent_at: &str) -> RenderedEmail {
    let subject = "Test Email - OD Notification System".to_string();
    let body = format!(
        "<h2>Test email</h2>\
         <p>This message confirms that the email provider accepts mail from {sender}.</p>\
         <p>Sent at {sent_at}.</p>",
        sender = escape_html(sender),
        sent_at = escape_html(sent_at),
    );
    RenderedEmail {
        html: page(&subject, &body),
        subject,
    }
}
