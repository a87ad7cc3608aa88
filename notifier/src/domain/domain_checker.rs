use async_trait::async_trait;

/// Pre-send check that a recipient's domain can receive mail at all.
#[async_trait]
pub trait DomainChecker: Send + Sync {
    async fn accepts_mail(&self, domain: &str) -> bool;
}
