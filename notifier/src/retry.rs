use crate::domain::email_client::{DeliveryError, EmailClient, ErrorKind};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Pause after every successful send, throttling the caller's loop.
    pub inter_send_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            inter_send_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn with_inter_send_delay(inter_send_delay: Duration) -> Self {
        Self {
            inter_send_delay,
            ..Self::default()
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Send one email, retrying transient failures. Returns the number of attempts used.
#[tracing::instrument(name = "Sending email with retry", skip(client, subject, html_content, policy))]
pub async fn send_with_retry(
    client: &dyn EmailClient,
    recipient: &str,
    subject: &str,
    html_content: &str,
    policy: &RetryPolicy,
) -> Result<u32, DeliveryError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match client.send_email_to(recipient, subject, html_content).await {
            Ok(()) => {
                tracing::info!(attempt, "Email sent");
                tokio::time::sleep(policy.inter_send_delay).await;
                return Ok(attempt);
            }
            Err(e) if e.kind == ErrorKind::AuthenticationError => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Authentication failed, not retrying"
                );
                return Err(e);
            }
            Err(e) if attempt >= max_attempts => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    attempt,
                    "Giving up after the last attempt"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Send failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
