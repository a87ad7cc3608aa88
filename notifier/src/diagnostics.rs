use crate::configuration::Settings;
use crate::domain::email_client::{AccountProbe, AccountSummary, ErrorKind};
use crate::domain::records::{Student, Teacher};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvPresence {
    pub name: &'static str,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderStatus {
    Connected(AccountSummary),
    Failed { kind: ErrorKind, message: String },
    NotChecked,
}

/// Point-in-time facts attached to admin alerts.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticSnapshot {
    pub env: Vec<EnvPresence>,
    pub record_counts: Vec<(String, usize)>,
    pub provider: ProviderStatus,
    pub timezone: String,
}

fn is_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Which settings are present. Values are never reported.
pub fn env_presence(settings: &Settings) -> Vec<EnvPresence> {
    vec![
        EnvPresence {
            name: "BREVO_API_KEY",
            present: settings.has_brevo_api_key(),
        },
        EnvPresence {
            name: "SENDER_EMAIL",
            present: settings.has_sender_email(),
        },
        EnvPresence {
            name: "SENDER_NAME",
            present: is_set(settings.sender_name.as_deref()),
        },
        EnvPresence {
            name: "ADMIN_EMAIL",
            present: is_set(settings.admin_email.as_deref()),
        },
        EnvPresence {
            name: "GMAIL_USER",
            present: is_set(settings.gmail_user.as_deref()),
        },
        EnvPresence {
            name: "GMAIL_APP_PASSWORD",
            present: settings.gmail_credentials().is_some(),
        },
    ]
}

/// Record count per date, oldest first.
pub fn date_distribution(students: &[Student]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for s in students {
        *counts.entry(s.date.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(date, n)| (date.to_string(), n))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SectionCoverage {
    pub covered: Vec<String>,
    pub uncovered: Vec<String>,
}

/// Student sections split by whether a teacher is assigned.
pub fn section_coverage(students: &[Student], teachers: &[Teacher]) -> SectionCoverage {
    let assigned: BTreeSet<&str> = teachers.iter().map(|t| t.section.as_str()).collect();
    let sections: BTreeSet<&str> = students.iter().map(|s| s.section.as_str()).collect();

    let (covered, uncovered): (Vec<&str>, Vec<&str>) =
        sections.into_iter().partition(|s| assigned.contains(s));

    SectionCoverage {
        covered: covered.into_iter().map(str::to_string).collect(),
        uncovered: uncovered.into_iter().map(str::to_string).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreflightReport {
    pub duplicate_regnos: Vec<String>,
    pub duplicate_teacher_sections: Vec<String>,
    pub sections_without_teacher: Vec<String>,
}

impl PreflightReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_regnos.is_empty()
            && self.duplicate_teacher_sections.is_empty()
            && self.sections_without_teacher.is_empty()
    }
}

fn duplicates<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *seen.entry(v).or_default() += 1;
    }
    let mut dupes: Vec<String> = seen
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(v, _)| v.to_string())
        .collect();
    dupes.sort();
    dupes
}

/// Data problems worth knowing about before a live run.
pub fn preflight(students: &[Student], teachers: &[Teacher]) -> PreflightReport {
    // A student can be on duty on several dates, so only same-day repeats count.
    let regno_per_day = students
        .iter()
        .map(|s| format!("{} on {}", s.regno, s.date))
        .collect::<Vec<_>>();

    PreflightReport {
        duplicate_regnos: duplicates(regno_per_day.iter().map(String::as_str)),
        duplicate_teacher_sections: duplicates(teachers.iter().map(|t| t.section.as_str())),
        sections_without_teacher: section_coverage(students, teachers).uncovered,
    }
}

#[tracing::instrument(name = "Probing email provider", skip(probe))]
pub async fn provider_status(probe: Option<&dyn AccountProbe>) -> ProviderStatus {
    let Some(probe) = probe else {
        return ProviderStatus::NotChecked;
    };
    match probe.account().await {
        Ok(account) => {
            tracing::info!(account.email = %account.email, "Email provider reachable");
            ProviderStatus::Connected(account)
        }
        Err(e) => {
            tracing::warn!(
                error.cause_chain = ?e,
                error.message = %e,
                "Email provider probe failed"
            );
            ProviderStatus::Failed {
                kind: e.kind,
                message: e.message,
            }
        }
    }
}
