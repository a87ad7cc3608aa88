use crate::domain::recipient_email::RecipientEmail;
use crate::utils::error_chain_fmt;
use chrono_tz::Tz;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_QUOTA: u32 = 300;

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecipientSource {
    Csv,
    Dynamodb,
}

/// Everything the process reads from `configuration/base.yaml` and the environment.
///
/// Nothing here is required at load time. `Settings::delivery` is the gate
/// that checks what a run actually needs.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Settings {
    pub brevo_api_key: Option<Secret<String>>,
    pub sender_email: Option<String>,
    pub sender_name: Option<String>,
    pub admin_email: Option<String>,
    pub app_timezone: String,
    pub send_time: Option<String>,
    pub cron_email_time: Option<String>,
    pub max_email_quota: Option<u32>,
    pub max_emails_per_day: Option<u32>,
    pub rate_limit_delay_ms: u64,
    pub gmail_user: Option<String>,
    pub gmail_app_password: Option<Secret<String>>,
    pub brevo_base_url: String,
    pub email_timeout_ms: u64,
    pub students_csv: PathBuf,
    pub teachers_csv: PathBuf,
    pub subscribers_csv: PathBuf,
    pub recipient_source: RecipientSource,
    pub dynamodb_table: Option<String>,
    pub dynamodb_endpoint: Option<String>,
    pub mx_check: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brevo_api_key: None,
            sender_email: None,
            sender_name: None,
            admin_email: None,
            app_timezone: "UTC".to_string(),
            send_time: None,
            cron_email_time: None,
            max_email_quota: None,
            max_emails_per_day: None,
            rate_limit_delay_ms: 2000,
            gmail_user: None,
            gmail_app_password: None,
            brevo_base_url: "https://api.brevo.com/v3".to_string(),
            email_timeout_ms: 10_000,
            students_csv: PathBuf::from("data/students.csv"),
            teachers_csv: PathBuf::from("data/teachers.csv"),
            subscribers_csv: PathBuf::from("data/subscribers.csv"),
            recipient_source: RecipientSource::Csv,
            dynamodb_table: None,
            dynamodb_endpoint: None,
            mx_check: false,
        }
    }
}

#[derive(thiserror::Error)]
pub enum SettingsError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl std::fmt::Debug for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Validated settings for a run that sends email.
#[derive(Clone, Debug)]
pub struct DeliverySettings {
    pub api_key: Secret<String>,
    pub sender: RecipientEmail,
    pub sender_name: Option<String>,
    pub admin_email: Option<RecipientEmail>,
    pub timezone: Tz,
    pub base_url: String,
    pub timeout: Duration,
    pub inter_send_delay: Duration,
    pub quota: u32,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn present_secret(value: &Option<Secret<String>>) -> bool {
    value
        .as_ref()
        .is_some_and(|s| !s.expose_secret().trim().is_empty())
}

impl Settings {
    /// The only gate between reading configuration and doing any work.
    pub fn delivery(&self) -> Result<DeliverySettings, SettingsError> {
        let api_key = match &self.brevo_api_key {
            Some(key) if present_secret(&self.brevo_api_key) => {
                Secret::new(key.expose_secret().trim().to_string())
            }
            _ => return Err(SettingsError::Missing("BREVO_API_KEY")),
        };

        let sender = present(&self.sender_email)
            .ok_or(SettingsError::Missing("SENDER_EMAIL"))
            .and_then(|s| {
                RecipientEmail::parse(s.to_string()).map_err(|reason| SettingsError::Invalid {
                    name: "SENDER_EMAIL",
                    reason,
                })
            })?;

        let admin_email = present(&self.admin_email)
            .map(|a| {
                RecipientEmail::parse(a.to_string()).map_err(|reason| SettingsError::Invalid {
                    name: "ADMIN_EMAIL",
                    reason,
                })
            })
            .transpose()?;

        let timezone = self.timezone()?;

        Ok(DeliverySettings {
            api_key,
            sender,
            sender_name: present(&self.sender_name).map(str::to_string),
            admin_email,
            timezone,
            base_url: self.brevo_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(self.email_timeout_ms),
            inter_send_delay: Duration::from_millis(self.rate_limit_delay_ms),
            quota: self.quota(),
        })
    }

    pub fn timezone(&self) -> Result<Tz, SettingsError> {
        self.app_timezone
            .trim()
            .parse::<Tz>()
            .map_err(|e| SettingsError::Invalid {
                name: "APP_TIMEZONE",
                reason: e.to_string(),
            })
    }

    /// `MAX_EMAIL_QUOTA` wins over `MAX_EMAILS_PER_DAY`.
    pub fn quota(&self) -> u32 {
        self.max_email_quota
            .or(self.max_emails_per_day)
            .unwrap_or(DEFAULT_QUOTA)
    }

    pub fn send_time(&self) -> &str {
        present(&self.send_time)
            .or(present(&self.cron_email_time))
            .unwrap_or("07:00")
    }

    pub fn gmail_credentials(&self) -> Option<(&str, &Secret<String>)> {
        let user = present(&self.gmail_user)?;
        if !present_secret(&self.gmail_app_password) {
            return None;
        }
        self.gmail_app_password.as_ref().map(|p| (user, p))
    }

    /// Where admin reports go: `ADMIN_EMAIL`, else the Gmail account itself.
    pub fn admin_recipient(&self) -> Option<String> {
        present(&self.admin_email)
            .or(present(&self.gmail_user))
            .map(str::to_lowercase)
    }

    /// `DYNAMODB_TABLE`, ignoring blank values.
    pub fn dynamodb_table(&self) -> Option<&str> {
        present(&self.dynamodb_table)
    }

    /// `DYNAMODB_ENDPOINT`, ignoring blank values so the SDK default applies.
    pub fn dynamodb_endpoint(&self) -> Option<&str> {
        present(&self.dynamodb_endpoint)
    }

    pub fn has_brevo_api_key(&self) -> bool {
        present_secret(&self.brevo_api_key)
    }

    pub fn has_sender_email(&self) -> bool {
        present(&self.sender_email).is_some()
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| config::ConfigError::Foreign(e.into()))?;
    let configuration_directory = base_path.join("configuration");

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(false))
        // Plain environment variables, e.g. `BREVO_API_KEY` sets `Settings.brevo_api_key`.
        .add_source(config::Environment::default().try_parsing(true))
        .build()?;

    settings.try_deserialize::<Settings>()
}
