use crate::domain::email_client::ErrorKind;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// Outcome for one recipient in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResult {
    pub recipient_key: String,
    pub recipient_name: String,
    pub email: String,
    pub status: DeliveryStatus,
    pub reason: String,
    pub affected_count: usize,
    pub error_kind: Option<ErrorKind>,
}

impl DeliveryResult {
    pub fn success(
        recipient_key: impl Into<String>,
        recipient_name: impl Into<String>,
        email: impl Into<String>,
        affected_count: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            recipient_key: recipient_key.into(),
            recipient_name: recipient_name.into(),
            email: email.into(),
            status: DeliveryStatus::Success,
            reason: reason.into(),
            affected_count,
            error_kind: None,
        }
    }

    pub fn failed(
        recipient_key: impl Into<String>,
        recipient_name: impl Into<String>,
        email: impl Into<String>,
        affected_count: usize,
        reason: impl Into<String>,
        error_kind: Option<ErrorKind>,
    ) -> Self {
        Self {
            recipient_key: recipient_key.into(),
            recipient_name: recipient_name.into(),
            email: email.into(),
            status: DeliveryStatus::Failed,
            reason: reason.into(),
            affected_count,
            error_kind,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub execution_time: Duration,
    pub failures: Vec<DeliveryResult>,
}

impl RunStats {
    pub fn from_results(results: &[DeliveryResult], execution_time: Duration) -> Self {
        let failures: Vec<DeliveryResult> = results
            .iter()
            .filter(|r| !r.is_success())
            .cloned()
            .collect();
        Self {
            total: results.len(),
            success: results.len() - failures.len(),
            failed: failures.len(),
            execution_time,
            failures,
        }
    }

    /// Kind of the first classified failure, used to pick the alert's advice.
    pub fn dominant_error_kind(&self) -> Option<ErrorKind> {
        self.failures.iter().find_map(|f| f.error_kind)
    }
}
