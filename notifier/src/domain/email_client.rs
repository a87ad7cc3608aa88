use async_trait::async_trait;

/// Likely cause of a failed delivery, decided once where the provider error is first seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthenticationError,
    ApiLimitExceeded,
    RateLimit,
    NetworkError,
    ValidationError,
    UnknownError,
}

const AUTH_SIGNATURES: &[&str] = &[
    "unauthorized",
    "invalid api key",
    "key not found",
];
// Only meaningful without an HTTP status, where the message is an SMTP reply.
const SMTP_AUTH_SIGNATURES: &[&str] = &["authentication"];
const RATE_LIMIT_SIGNATURES: &[&str] = &["too many requests"];
const QUOTA_SIGNATURES: &[&str] = &[
    "not_enough_credits",
    "daily_limit",
    "quota",
    "limit",
    "credits",
];
const NETWORK_SIGNATURES: &[&str] = &[
    "etimedout",
    "enotfound",
    "econnrefused",
    "timed out",
    "timeout",
    "dns error",
    "connection refused",
];
const VALIDATION_SIGNATURES: &[&str] = &["invalid", "not verified", "sender"];

impl ErrorKind {
    /// Classify a provider failure from its HTTP status (if any) and message.
    ///
    /// Checks run from the most to the least specific cause, so a 401 that
    /// mentions "invalid" is still an authentication problem.
    pub fn classify(status: Option<u16>, message: &str) -> ErrorKind {
        let message = message.to_lowercase();
        let mentions = |signatures: &[&str]| signatures.iter().any(|s| message.contains(s));

        if status == Some(401)
            || mentions(AUTH_SIGNATURES)
            || (status.is_none() && mentions(SMTP_AUTH_SIGNATURES))
        {
            ErrorKind::AuthenticationError
        } else if mentions(RATE_LIMIT_SIGNATURES) {
            ErrorKind::RateLimit
        } else if status == Some(429) || mentions(QUOTA_SIGNATURES) {
            ErrorKind::ApiLimitExceeded
        } else if mentions(NETWORK_SIGNATURES) {
            ErrorKind::NetworkError
        } else if status == Some(400) || mentions(VALIDATION_SIGNATURES) {
            ErrorKind::ValidationError
        } else {
            ErrorKind::UnknownError
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationError => "AUTHENTICATION_ERROR",
            ErrorKind::ApiLimitExceeded => "API_LIMIT_EXCEEDED",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationError => {
                "The Brevo API key was rejected. Check that BREVO_API_KEY is set to an active key."
            }
            ErrorKind::ApiLimitExceeded => {
                "The Brevo account is out of credits or hit its daily sending limit."
            }
            ErrorKind::RateLimit => "Brevo is throttling requests from this account.",
            ErrorKind::NetworkError => {
                "The Brevo API could not be reached. Check DNS and outbound connectivity."
            }
            ErrorKind::ValidationError => {
                "The request was rejected as invalid. Check the recipient address and that the sender is verified in Brevo."
            }
            ErrorKind::UnknownError => "An unexpected error occurred while sending.",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationError => {
                "Generate a new API key in the Brevo dashboard and update BREVO_API_KEY."
            }
            ErrorKind::ApiLimitExceeded => {
                "Wait for the daily quota to reset or upgrade the Brevo plan."
            }
            ErrorKind::RateLimit => "Increase RATE_LIMIT_DELAY_MS and run again.",
            ErrorKind::NetworkError => "Retry later. If it persists, check firewall and proxy settings.",
            ErrorKind::ValidationError => {
                "Verify SENDER_EMAIL in Brevo and fix the invalid addresses in the CSV files."
            }
            ErrorKind::UnknownError => "Inspect the run logs for the full error chain.",
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorKind::AuthenticationError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DeliveryError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DeliveryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build an error whose kind is derived from the provider's answer.
    pub fn classified(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::classify(status, &message),
            message,
        }
    }
}

/// Reject addresses that cannot possibly be delivered, without touching the network.
pub fn precheck_recipient(recipient: &str) -> Result<(), DeliveryError> {
    let recipient = recipient.trim();
    if recipient.is_empty() {
        return Err(DeliveryError::new(
            ErrorKind::ValidationError,
            "Recipient email is empty",
        ));
    }
    if !recipient.contains('@') {
        return Err(DeliveryError::new(
            ErrorKind::ValidationError,
            format!("Invalid recipient email address: {}", recipient),
        ));
    }
    Ok(())
}

#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send_email_to(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    pub email: String,
    pub company: Option<String>,
    pub plan: Option<String>,
    pub credits: Option<f64>,
}

/// Read-only view of the provider account, used by diagnostics.
#[async_trait]
pub trait AccountProbe: Send + Sync {
    async fn account(&self) -> Result<AccountSummary, DeliveryError>;
}
