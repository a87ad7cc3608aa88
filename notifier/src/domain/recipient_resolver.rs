use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

/// Finds who should receive the email for a group key, e.g. the teacher of a section.
///
/// `Ok(None)` means nobody is assigned. `Err` means the lookup itself failed.
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    async fn resolve(&self, key: &str) -> Result<Option<Recipient>, anyhow::Error>;
}
