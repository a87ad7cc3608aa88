use crate::domain::recipient_email::is_valid_email;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// One parsed CSV row: column name to trimmed cell value.
pub type RawRow = HashMap<String, String>;

static REGNO_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^24CS\d{3}$").expect("regno pattern is valid"));
static SECTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-o]$").expect("section pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowValidationError {
    pub line: usize,
    pub violations: Vec<String>,
}

impl std::fmt::Display for RowValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .violations
            .iter()
            .map(|v| format!("Line {}: {}", self.line, v))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}

impl std::error::Error for RowValidationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Student,
    Teacher,
    Subscriber,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Student => "student",
            RecordKind::Teacher => "teacher",
            RecordKind::Subscriber => "subscriber",
        }
    }
}

/// A row type the loader knows how to validate.
pub trait Record: Sized + Send + 'static {
    const KIND: RecordKind;

    fn validate(row: &RawRow, line: usize) -> Result<Self, RowValidationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub name: String,
    pub email: String,
    pub regno: String,
    pub section: String,
    pub event: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teacher {
    pub name: String,
    pub email: String,
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub name: String,
    pub email: String,
    pub subscribed_date: String,
    pub department: String,
    pub preferences: String,
    pub custom_field_1: String,
    pub custom_field_2: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedRecord {
    Student(Student),
    Teacher(Teacher),
    Subscriber(Subscriber),
}

impl ValidatedRecord {
    pub fn email(&self) -> &str {
        match self {
            ValidatedRecord::Student(s) => &s.email,
            ValidatedRecord::Teacher(t) => &t.email,
            ValidatedRecord::Subscriber(s) => &s.email,
        }
    }
}

/// Validate a row of the given kind.
pub fn validate(
    kind: RecordKind,
    row: &RawRow,
    line: usize,
) -> Result<ValidatedRecord, RowValidationError> {
    match kind {
        RecordKind::Student => Student::validate(row, line).map(ValidatedRecord::Student),
        RecordKind::Teacher => Teacher::validate(row, line).map(ValidatedRecord::Teacher),
        RecordKind::Subscriber => {
            Subscriber::validate(row, line).map(ValidatedRecord::Subscriber)
        }
    }
}

fn field<'a>(row: &'a RawRow, name: &str) -> Option<&'a str> {
    row.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn display(value: Option<&str>) -> &str {
    value.unwrap_or_default()
}

fn current_utc_date() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

fn check_section(section: Option<&str>, violations: &mut Vec<String>) {
    if !section.is_some_and(|s| SECTION_PATTERN.is_match(s)) {
        violations.push(format!(
            "Invalid section ({}). Should be a-o",
            display(section)
        ));
    }
}

fn check_emailid(email: Option<&str>, violations: &mut Vec<String>) {
    if !email.is_some_and(is_valid_email) {
        violations.push(format!("Invalid emailid ({})", display(email)));
    }
}

impl Record for Student {
    const KIND: RecordKind = RecordKind::Student;

    fn validate(row: &RawRow, line: usize) -> Result<Self, RowValidationError> {
        let mut violations = Vec::new();

        let name = field(row, "name");
        let email = field(row, "emailid");
        let regno = field(row, "regno");
        let section = field(row, "section");

        if name.is_none() {
            violations.push("Missing name".to_string());
        }
        check_emailid(email, &mut violations);
        if !regno.is_some_and(|r| REGNO_PATTERN.is_match(r)) {
            violations.push(format!(
                "Invalid regno format ({}). Should be 24CSXXX",
                display(regno)
            ));
        }
        check_section(section, &mut violations);

        match (name, email, regno, section) {
            (Some(name), Some(email), Some(regno), Some(section)) if violations.is_empty() => {
                Ok(Student {
                    name: name.to_string(),
                    email: email.to_lowercase(),
                    regno: regno.to_uppercase(),
                    section: section.to_lowercase(),
                    event: field(row, "event").unwrap_or("N/A").to_string(),
                    date: field(row, "date")
                        .map(str::to_string)
                        .unwrap_or_else(current_utc_date),
                })
            }
            _ => Err(RowValidationError { line, violations }),
        }
    }
}

impl Record for Teacher {
    const KIND: RecordKind = RecordKind::Teacher;

    fn validate(row: &RawRow, line: usize) -> Result<Self, RowValidationError> {
        let mut violations = Vec::new();

        let name = field(row, "teacher_name");
        let email = field(row, "emailid");
        let section = field(row, "section");

        if name.is_none() {
            violations.push("Missing teacher name".to_string());
        }
        check_emailid(email, &mut violations);
        check_section(section, &mut violations);

        match (name, email, section) {
            (Some(name), Some(email), Some(section)) if violations.is_empty() => Ok(Teacher {
                name: name.to_string(),
                email: email.to_lowercase(),
                section: section.to_lowercase(),
            }),
            _ => Err(RowValidationError { line, violations }),
        }
    }
}

impl Record for Subscriber {
    const KIND: RecordKind = RecordKind::Subscriber;

    fn validate(row: &RawRow, line: usize) -> Result<Self, RowValidationError> {
        let mut violations = Vec::new();

        let name = field(row, "name");
        let email = field(row, "email");

        if name.is_none() {
            violations.push("Missing name".to_string());
        }
        match email {
            None => violations.push("Missing email".to_string()),
            Some(e) if !is_valid_email(e) => {
                violations.push(format!("Invalid email format ({})", e))
            }
            Some(_) => {}
        }

        match (name, email) {
            (Some(name), Some(email)) if violations.is_empty() => Ok(Subscriber {
                name: name.to_string(),
                email: email.to_lowercase(),
                subscribed_date: field(row, "subscribed_date")
                    .map(str::to_string)
                    .unwrap_or_else(current_utc_date),
                department: field(row, "department").unwrap_or("General").to_string(),
                preferences: field(row, "preferences").unwrap_or("general").to_string(),
                custom_field_1: field(row, "custom_field_1").unwrap_or_default().to_string(),
                custom_field_2: field(row, "custom_field_2").unwrap_or_default().to_string(),
            }),
            _ => Err(RowValidationError { line, violations }),
        }
    }
}
