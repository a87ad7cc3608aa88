use crate::adapters::brevo_email_client::BrevoEmailClient;
use crate::adapters::dynamodb_teacher_directory::DynamoDbTeacherDirectory;
use crate::adapters::gmail_notifier::GmailNotifier;
use crate::adapters::mx_domain_checker::MxDomainChecker;
use crate::campaign::ServiceFactory;
use crate::configuration::{DeliverySettings, Settings};
use crate::domain::domain_checker::DomainChecker;
use crate::domain::email_client::{AccountProbe, EmailClient};
use crate::domain::recipient_resolver::RecipientResolver;
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Wires the real Brevo, Gmail, DynamoDB and DNS adapters.
pub struct ProductionServiceFactory;

impl ProductionServiceFactory {
    fn brevo(delivery: &DeliverySettings) -> Result<BrevoEmailClient, anyhow::Error> {
        BrevoEmailClient::new(
            delivery.base_url.clone(),
            delivery.sender.clone(),
            delivery.sender_name.clone(),
            delivery.api_key.clone(),
            delivery.timeout,
        )
        .context("Failed to build the Brevo HTTP client")
    }
}

#[async_trait]
impl ServiceFactory for ProductionServiceFactory {
    fn email_client(
        &self,
        delivery: &DeliverySettings,
    ) -> Result<Arc<dyn EmailClient>, anyhow::Error> {
        Ok(Arc::new(Self::brevo(delivery)?))
    }

    fn report_client(&self, settings: &Settings) -> Option<Arc<dyn EmailClient>> {
        let (user, password) = settings.gmail_credentials()?;
        match GmailNotifier::new(user, password, Duration::from_millis(settings.email_timeout_ms)) {
            Ok(gmail) => Some(Arc::new(gmail)),
            Err(e) => {
                tracing::warn!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Gmail is configured but unusable, falling back to Brevo"
                );
                None
            }
        }
    }

    async fn remote_resolver(
        &self,
        settings: &Settings,
    ) -> Result<Arc<dyn RecipientResolver>, anyhow::Error> {
        let table = settings
            .dynamodb_table()
            .context("DYNAMODB_TABLE must be set when RECIPIENT_SOURCE is dynamodb")?;
        let directory =
            DynamoDbTeacherDirectory::from_env(table.to_string(), settings.dynamodb_endpoint())
                .await;
        Ok(Arc::new(directory))
    }

    fn domain_checker(&self, settings: &Settings) -> Option<Arc<dyn DomainChecker>> {
        if !settings.mx_check {
            return None;
        }
        match MxDomainChecker::new(Duration::from_secs(5)) {
            Ok(checker) => Some(Arc::new(checker)),
            Err(e) => {
                tracing::warn!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "DNS resolver unavailable, skipping MX checks"
                );
                None
            }
        }
    }

    fn account_probe(&self, delivery: &DeliverySettings) -> Option<Arc<dyn AccountProbe>> {
        Self::brevo(delivery)
            .map(|client| Arc::new(client) as Arc<dyn AccountProbe>)
            .ok()
    }
}
