use crate::domain::email_client::{
    precheck_recipient, AccountProbe, AccountSummary, DeliveryError, EmailClient, ErrorKind,
};
use crate::domain::recipient_email::RecipientEmail;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transactional email through the Brevo v3 HTTP API.
#[derive(Debug, Clone)]
pub struct BrevoEmailClient {
    http_client: Client,
    base_url: String,
    sender: RecipientEmail,
    sender_name: Option<String>,
    api_key: Secret<String>,
}

impl BrevoEmailClient {
    pub fn new(
        base_url: String,
        sender: RecipientEmail,
        sender_name: Option<String>,
        api_key: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            sender,
            sender_name,
            api_key,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: Sender<'a>,
    to: Vec<To<'a>>,
    subject: &'a str,
    html_content: &'a str,
}

#[derive(Serialize)]
struct Sender<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct To<'a> {
    email: &'a str,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    email: String,
    company_name: Option<String>,
    #[serde(default)]
    plan: Vec<Plan>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Plan {
    #[serde(rename = "type")]
    plan_type: Option<String>,
    credits: Option<f64>,
}

fn transport_error(e: reqwest::Error) -> DeliveryError {
    if e.is_timeout() || e.is_connect() {
        DeliveryError::new(ErrorKind::NetworkError, e.to_string())
    } else {
        DeliveryError::classified(None, e.to_string())
    }
}

/// Turn a non-2xx answer into a classified error, using Brevo's `{code, message}` body.
async fn provider_error(response: reqwest::Response) -> DeliveryError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();

    let message = match (body.code, body.message) {
        (Some(code), Some(message)) => format!("{} ({})", message, code),
        (None, Some(message)) => message,
        (Some(code), None) => code,
        (None, None) if !text.is_empty() => text,
        (None, None) => status
            .canonical_reason()
            .unwrap_or("Unexpected provider response")
            .to_string(),
    };

    DeliveryError::classified(Some(status.as_u16()), format!("HTTP {}: {}", status.as_u16(), message))
}

#[async_trait]
impl EmailClient for BrevoEmailClient {
    #[tracing::instrument(name = "Sending email through Brevo", skip(self, subject, html_content))]
    async fn send_email_to(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
    ) -> Result<(), DeliveryError> {
        precheck_recipient(recipient)?;

        let url = format!("{}/smtp/email", self.base_url);
        let request_body = SendEmailRequest {
            sender: Sender {
                email: self.sender.as_ref(),
                name: self.sender_name.as_deref(),
            },
            to: vec![To {
                email: recipient.trim(),
            }],
            subject,
            html_content,
        };

        let response = self
            .http_client
            .post(&url)
            .header("api-key", self.api_key.expose_secret())
            .header("accept", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(provider_error(response).await)
        }
    }
}

#[async_trait]
impl AccountProbe for BrevoEmailClient {
    #[tracing::instrument(name = "Fetching Brevo account", skip(self))]
    async fn account(&self) -> Result<AccountSummary, DeliveryError> {
        let url = format!("{}/account", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .header("api-key", self.api_key.expose_secret())
            .header("accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let account: AccountResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::new(ErrorKind::UnknownError, e.to_string()))?;

        // Transactional plans report credits on a separate entry from the subscription plan.
        let plan = account.plan.iter().find_map(|p| p.plan_type.clone());
        let credits = account.plan.iter().filter_map(|p| p.credits).reduce(f64::max);

        Ok(AccountSummary {
            email: account.email,
            company: account.company_name,
            plan,
            credits,
        })
    }
}
