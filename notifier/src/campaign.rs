use crate::adapters::csv_teacher_directory::CsvTeacherDirectory;
use crate::configuration::{DeliverySettings, RecipientSource, Settings, SettingsError};
use crate::csv_loader::{self, LoadError};
use crate::diagnostics::{env_presence, provider_status, DiagnosticSnapshot};
use crate::domain::delivery::{DeliveryResult, RunStats};
use crate::domain::domain_checker::DomainChecker;
use crate::domain::email_client::{AccountProbe, DeliveryError, EmailClient, ErrorKind};
use crate::domain::recipient_email::{is_valid_email, RecipientEmail};
use crate::domain::recipient_resolver::{Recipient, RecipientResolver};
use crate::domain::records::{Student, Subscriber, Teacher};
use crate::grouping::{group_by_key, Groups};
use crate::retry::{send_with_retry, RetryPolicy};
use crate::templates::{self, RenderedEmail, ReportView};
use crate::utils::{error_chain_fmt, error_chain_message};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Campaign {
    /// Daily OD lists to section teachers.
    #[value(name = "od")]
    OdNotifications,
    /// Daily update to every subscriber.
    #[value(name = "digest")]
    SubscriberDigest,
}

impl Campaign {
    pub fn label(&self) -> &'static str {
        match self {
            Campaign::OdNotifications => "OD Notifications",
            Campaign::SubscriberDigest => "Subscriber Digest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Live,
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Configuring,
    Loading,
    Grouping,
    Sending,
    Reporting,
    Done,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub campaign: Campaign,
    pub mode: RunMode,
    /// Overrides "today"; otherwise computed in `APP_TIMEZONE`.
    pub today: Option<NaiveDate>,
}

/// Parse a `--date` argument. Only `YYYY-MM-DD` matches the CSV date column.
pub fn parse_run_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a date in YYYY-MM-DD form", value))
}

#[derive(thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("No valid {0} records found")]
    NoRecords(&'static str),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Sent { to: String },
    Logged,
    Skipped(String),
    Failed(String),
}

/// Everything a finished run knows about itself.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub campaign: Campaign,
    pub mode: RunMode,
    pub date: String,
    /// Last working phase reached before reporting.
    pub phase: RunPhase,
    pub fatal_error: Option<String>,
    pub records_loaded: usize,
    pub records_rejected: usize,
    pub results: Vec<DeliveryResult>,
    pub stats: RunStats,
    pub report: ReportOutcome,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        if self.fatal_error.is_some() {
            1
        } else if self.mode == RunMode::DryRun {
            0
        } else if self.stats.failed > 0 {
            1
        } else {
            0
        }
    }
}

/// Builds the outbound collaborators once the configuration gate has passed.
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    fn email_client(
        &self,
        delivery: &DeliverySettings,
    ) -> Result<Arc<dyn EmailClient>, anyhow::Error>;

    /// Dedicated admin-report channel, if one is configured.
    fn report_client(&self, settings: &Settings) -> Option<Arc<dyn EmailClient>>;

    async fn remote_resolver(
        &self,
        settings: &Settings,
    ) -> Result<Arc<dyn RecipientResolver>, anyhow::Error>;

    fn domain_checker(&self, settings: &Settings) -> Option<Arc<dyn DomainChecker>>;

    fn account_probe(&self, delivery: &DeliverySettings) -> Option<Arc<dyn AccountProbe>>;
}

pub const NO_TEACHER_REASON: &str = "No teacher assigned for this section";
pub const DRY_RUN_REASON: &str = "Dry run: email rendered, not sent";
const SENT_REASON: &str = "Email sent successfully";

/// Loaded data, ready to be grouped.
enum Loaded {
    Od {
        students: Vec<Student>,
        resolver: Arc<dyn RecipientResolver>,
    },
    Digest {
        subscribers: Vec<Subscriber>,
    },
}

struct Progress {
    phase: RunPhase,
    date: String,
    records_loaded: usize,
    records_rejected: usize,
    results: Vec<DeliveryResult>,
}

pub struct CampaignRunner<'a> {
    settings: &'a Settings,
    factory: &'a dyn ServiceFactory,
    options: RunOptions,
    run_id: Uuid,
}

impl<'a> CampaignRunner<'a> {
    pub fn new(settings: &'a Settings, factory: &'a dyn ServiceFactory, options: RunOptions) -> Self {
        Self {
            settings,
            factory,
            options,
            run_id: Uuid::new_v4(),
        }
    }

    fn dry_run(&self) -> bool {
        self.options.mode == RunMode::DryRun
    }

    #[tracing::instrument(
        name = "Running campaign",
        skip(self),
        fields(
            run_id = %self.run_id,
            campaign = self.options.campaign.label(),
            dry_run = self.dry_run(),
        )
    )]
    pub async fn run(&self) -> RunReport {
        let started = Instant::now();
        let mut progress = Progress {
            phase: RunPhase::Configuring,
            date: self
                .options
                .today
                .unwrap_or_else(|| Utc::now().date_naive())
                .format("%Y-%m-%d")
                .to_string(),
            records_loaded: 0,
            records_rejected: 0,
            results: Vec::new(),
        };

        let mut delivery = None;
        let mut email_client = None;

        let outcome = self
            .execute(&mut progress, &mut delivery, &mut email_client)
            .await;

        let fatal_error = match outcome {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    phase = ?progress.phase,
                    "Run aborted"
                );
                Some(error_chain_message(&e))
            }
        };

        let reached = progress.phase;
        tracing::info!(phase = ?RunPhase::Reporting, "Entering phase");
        let stats = RunStats::from_results(&progress.results, started.elapsed());

        let mut report = RunReport {
            run_id: self.run_id,
            campaign: self.options.campaign,
            mode: self.options.mode,
            date: progress.date,
            phase: reached,
            fatal_error,
            records_loaded: progress.records_loaded,
            records_rejected: progress.records_rejected,
            results: progress.results,
            stats,
            report: ReportOutcome::Logged,
        };

        report.report = self
            .send_admin_report(&report, delivery.as_ref(), email_client)
            .await;

        tracing::info!(
            phase = ?RunPhase::Done,
            total = report.stats.total,
            success = report.stats.success,
            failed = report.stats.failed,
            exit_code = report.exit_code(),
            "Run finished"
        );
        report
    }

    async fn execute(
        &self,
        progress: &mut Progress,
        delivery_slot: &mut Option<DeliverySettings>,
        client_slot: &mut Option<Arc<dyn EmailClient>>,
    ) -> Result<(), RunError> {
        // Configuring: nothing is read or built before this passes.
        let delivery = self.settings.delivery()?;
        if self.options.today.is_none() {
            progress.date = Utc::now()
                .with_timezone(&delivery.timezone)
                .format("%Y-%m-%d")
                .to_string();
        }
        let client = self.factory.email_client(&delivery)?;
        *delivery_slot = Some(delivery.clone());
        *client_slot = Some(client.clone());
        tracing::info!(date = %progress.date, "Configuration validated");

        progress.phase = RunPhase::Loading;
        tracing::info!(phase = ?progress.phase, "Entering phase");
        let loaded = self.load(progress).await?;

        progress.phase = RunPhase::Grouping;
        let mut dispatcher = Dispatcher {
            client: client.as_ref(),
            checker: self.factory.domain_checker(self.settings),
            policy: RetryPolicy::with_inter_send_delay(delivery.inter_send_delay),
            quota: delivery.quota,
            sent: 0,
            auth_failure: None,
            dry_run: self.dry_run(),
            results: Vec::new(),
        };

        match loaded {
            Loaded::Od { students, resolver } => {
                let todays: Vec<Student> = students
                    .into_iter()
                    .filter(|s| s.date == progress.date)
                    .collect();
                if todays.is_empty() {
                    tracing::info!(date = %progress.date, "No records for today");
                }
                let groups = group_by_key(todays, |s| s.section.as_str());
                tracing::info!(groups = groups.len(), "Grouped records by section");

                progress.phase = RunPhase::Sending;
                self.send_od(&mut dispatcher, groups, resolver.as_ref(), &progress.date)
                    .await;
            }
            Loaded::Digest { subscribers } => {
                let groups = group_by_key(subscribers, |s| s.email.as_str());
                tracing::info!(groups = groups.len(), "Grouped subscribers by email");

                progress.phase = RunPhase::Sending;
                self.send_digest(&mut dispatcher, groups, &progress.date)
                    .await;
            }
        }

        progress.results = dispatcher.results;
        Ok(())
    }

    async fn load(&self, progress: &mut Progress) -> Result<Loaded, RunError> {
        match self.options.campaign {
            Campaign::OdNotifications => {
                let students = csv_loader::load::<Student>(&self.settings.students_csv).await?;
                progress.records_loaded += students.records.len();
                progress.records_rejected += students.rejected.len();
                if students.is_empty() {
                    return Err(RunError::NoRecords("student"));
                }

                let resolver: Arc<dyn RecipientResolver> = match self.settings.recipient_source {
                    RecipientSource::Csv => {
                        let teachers =
                            csv_loader::load::<Teacher>(&self.settings.teachers_csv).await?;
                        progress.records_rejected += teachers.rejected.len();
                        if teachers.is_empty() {
                            return Err(RunError::NoRecords("teacher"));
                        }
                        Arc::new(CsvTeacherDirectory::new(teachers.records))
                    }
                    RecipientSource::Dynamodb => self.factory.remote_resolver(self.settings).await?,
                };

                Ok(Loaded::Od {
                    students: students.records,
                    resolver,
                })
            }
            Campaign::SubscriberDigest => {
                let subscribers =
                    csv_loader::load::<Subscriber>(&self.settings.subscribers_csv).await?;
                progress.records_loaded += subscribers.records.len();
                progress.records_rejected += subscribers.rejected.len();
                if subscribers.is_empty() {
                    return Err(RunError::NoRecords("subscriber"));
                }
                Ok(Loaded::Digest {
                    subscribers: subscribers.records,
                })
            }
        }
    }

    async fn send_od(
        &self,
        dispatcher: &mut Dispatcher<'_>,
        groups: Groups<Student>,
        resolver: &dyn RecipientResolver,
        date: &str,
    ) {
        for (section, students) in groups {
            let lookup = resolver.resolve(&section).await;
            let key = section.to_uppercase();
            dispatcher
                .dispatch(&key, students.len(), lookup, NO_TEACHER_REASON, |teacher| {
                    templates::od_notification(&teacher.name, &section, date, &students)
                })
                .await;
        }
    }

    async fn send_digest(
        &self,
        dispatcher: &mut Dispatcher<'_>,
        groups: Groups<Subscriber>,
        date: &str,
    ) {
        for (email, subscribers) in groups {
            let Some(subscriber) = subscribers.first() else {
                continue;
            };
            let recipient = Recipient {
                name: subscriber.name.clone(),
                email: subscriber.email.clone(),
            };
            dispatcher
                .dispatch(&email, subscribers.len(), Ok(Some(recipient)), "No subscriber", |_| {
                    templates::subscriber_update(subscriber, date)
                })
                .await;
        }
    }

    #[tracing::instrument(name = "Sending admin report", skip_all)]
    async fn send_admin_report(
        &self,
        report: &RunReport,
        delivery: Option<&DeliverySettings>,
        brevo: Option<Arc<dyn EmailClient>>,
    ) -> ReportOutcome {
        let view = ReportView {
            campaign: report.campaign.label(),
            date: &report.date,
            dry_run: report.mode == RunMode::DryRun,
            stats: &report.stats,
            results: &report.results,
            records_loaded: report.records_loaded,
            records_rejected: report.records_rejected,
            fatal_error: report.fatal_error.as_deref(),
        };

        let email = if report.fatal_error.is_some() || report.stats.failed > 0 {
            let snapshot = self.snapshot(report, delivery).await;
            templates::error_alert(&view, &snapshot)
        } else {
            templates::admin_summary(&view)
        };

        let Some(admin) = self.settings.admin_recipient() else {
            tracing::warn!("ADMIN_EMAIL is not set, skipping the admin report");
            return ReportOutcome::Skipped("ADMIN_EMAIL is not set".to_string());
        };

        if self.dry_run() {
            tracing::info!(to = %admin, subject = %email.subject, "Dry run: admin report rendered, not sent");
            return ReportOutcome::Logged;
        }

        let Some(channel) = self.factory.report_client(self.settings).or(brevo) else {
            tracing::warn!("No email channel is available for the admin report");
            return ReportOutcome::Skipped("No email channel available".to_string());
        };

        match channel
            .send_email_to(&admin, &email.subject, &email.html)
            .await
        {
            Ok(()) => {
                tracing::info!(to = %admin, "Admin report sent");
                ReportOutcome::Sent { to: admin }
            }
            Err(e) => {
                tracing::warn!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Failed to send the admin report"
                );
                ReportOutcome::Failed(e.to_string())
            }
        }
    }

    async fn snapshot(
        &self,
        report: &RunReport,
        delivery: Option<&DeliverySettings>,
    ) -> DiagnosticSnapshot {
        let probe = match delivery {
            Some(delivery) if !self.dry_run() => self.factory.account_probe(delivery),
            _ => None,
        };
        let records_label = match report.campaign {
            Campaign::OdNotifications => "Students",
            Campaign::SubscriberDigest => "Subscribers",
        };

        DiagnosticSnapshot {
            env: env_presence(self.settings),
            record_counts: vec![
                (records_label.to_string(), report.records_loaded),
                ("Rejected rows".to_string(), report.records_rejected),
                ("Recipients".to_string(), report.stats.total),
            ],
            provider: provider_status(probe.as_deref()).await,
            timezone: self.settings.app_timezone.clone(),
        }
    }
}

/// Per-group sending state for one run.
struct Dispatcher<'c> {
    client: &'c dyn EmailClient,
    checker: Option<Arc<dyn DomainChecker>>,
    policy: RetryPolicy,
    quota: u32,
    sent: u32,
    auth_failure: Option<DeliveryError>,
    dry_run: bool,
    results: Vec<DeliveryResult>,
}

impl Dispatcher<'_> {
    #[tracing::instrument(name = "Dispatching group", skip(self, lookup, missing_reason, render))]
    async fn dispatch<F>(
        &mut self,
        key: &str,
        count: usize,
        lookup: Result<Option<Recipient>, anyhow::Error>,
        missing_reason: &str,
        render: F,
    ) where
        F: FnOnce(&Recipient) -> RenderedEmail + Send,
    {
        let recipient = match lookup {
            Ok(Some(recipient)) => recipient,
            Ok(None) => {
                tracing::warn!("{}", missing_reason);
                self.results
                    .push(DeliveryResult::failed(key, "N/A", "N/A", count, missing_reason, None));
                return;
            }
            Err(e) => {
                tracing::warn!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Recipient lookup failed"
                );
                self.results.push(DeliveryResult::failed(
                    key,
                    "N/A",
                    "N/A",
                    count,
                    format!("Recipient lookup failed: {}", error_chain_message(e.as_ref())),
                    None,
                ));
                return;
            }
        };

        let fail = |reason: String, kind: Option<ErrorKind>| {
            DeliveryResult::failed(key, &recipient.name, &recipient.email, count, reason, kind)
        };

        if let Some(auth) = &self.auth_failure {
            self.results.push(fail(
                format!("Skipped after authentication failure: {}", auth.message),
                Some(ErrorKind::AuthenticationError),
            ));
            return;
        }

        if !is_valid_email(&recipient.email) {
            self.results
                .push(fail("Invalid email format".to_string(), Some(ErrorKind::ValidationError)));
            return;
        }

        if let Some(checker) = &self.checker {
            let domain = RecipientEmail::parse(recipient.email.clone())
                .map(|e| e.domain().to_string())
                .unwrap_or_default();
            if !checker.accepts_mail(&domain).await {
                self.results.push(fail(
                    format!("Domain '{}' not found (MX record lookup failed)", domain),
                    None,
                ));
                return;
            }
        }

        if self.sent >= self.quota {
            tracing::warn!(quota = self.quota, "Email quota reached");
            self.results.push(fail(
                format!("Email quota exceeded ({} emails per run)", self.quota),
                None,
            ));
            return;
        }

        let email = render(&recipient);

        if self.dry_run {
            tracing::info!(
                to = %recipient.email,
                subject = %email.subject,
                bytes = email.html.len(),
                "Dry run: email rendered, not sent"
            );
            self.sent += 1;
            self.results.push(DeliveryResult::success(
                key,
                &recipient.name,
                &recipient.email,
                count,
                DRY_RUN_REASON,
            ));
            return;
        }

        match send_with_retry(
            self.client,
            &recipient.email,
            &email.subject,
            &email.html,
            &self.policy,
        )
        .await
        {
            Ok(attempts) => {
                self.sent += 1;
                tracing::info!(attempts, sent = self.sent, quota = self.quota, "Email delivered");
                self.results.push(DeliveryResult::success(
                    key,
                    &recipient.name,
                    &recipient.email,
                    count,
                    SENT_REASON,
                ));
            }
            Err(e) => {
                let result = fail(format!("{}: {}", e.kind, e.message), Some(e.kind));
                if e.kind == ErrorKind::AuthenticationError {
                    tracing::error!("Authentication failed, remaining groups will not be sent");
                    self.auth_failure = Some(e);
                }
                self.results.push(result);
            }
        }
    }
}
