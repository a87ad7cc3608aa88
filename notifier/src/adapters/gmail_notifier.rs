use crate::domain::email_client::{precheck_recipient, DeliveryError, EmailClient, ErrorKind};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;

const GMAIL_RELAY: &str = "smtp.gmail.com";

/// Admin-report channel through a Gmail account and app password.
pub struct GmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl GmailNotifier {
    pub fn new(
        user: &str,
        app_password: &Secret<String>,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let credentials = Credentials::new(
            user.to_string(),
            app_password.expose_secret().to_string(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(GMAIL_RELAY)?
            .credentials(credentials)
            .timeout(Some(timeout))
            .build();

        Ok(Self {
            transport,
            from: format!("OD Notifier <{}>", user),
        })
    }
}

fn smtp_error(e: lettre::transport::smtp::Error) -> DeliveryError {
    let message = e.to_string();
    if e.is_timeout() {
        DeliveryError::new(ErrorKind::NetworkError, message)
    } else if e.is_permanent() && message.contains("535") {
        DeliveryError::new(ErrorKind::AuthenticationError, message)
    } else {
        DeliveryError::classified(None, message)
    }
}

#[async_trait]
impl EmailClient for GmailNotifier {
    #[tracing::instrument(name = "Sending email through Gmail", skip(self, subject, html_content))]
    async fn send_email_to(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
    ) -> Result<(), DeliveryError> {
        precheck_recipient(recipient)?;

        let invalid = |e: String| DeliveryError::new(ErrorKind::ValidationError, e);
        let message = Message::builder()
            .from(self.from.parse::<Mailbox>().map_err(|e| invalid(format!("Invalid sender: {}", e)))?)
            .to(recipient
                .trim()
                .parse::<Mailbox>()
                .map_err(|e| invalid(format!("Invalid recipient: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_content.to_string())
            .map_err(|e| invalid(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(smtp_error)
    }
}
