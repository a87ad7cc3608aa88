use crate::domain::domain_checker::DomainChecker;
use async_trait::async_trait;
use hickory_resolver::{config::ResolverOpts, name_server::TokioConnectionProvider, TokioResolver};
use std::time::Duration;

/// Accepts a domain when it publishes at least one MX record.
pub struct MxDomainChecker {
    resolver: TokioResolver,
}

impl MxDomainChecker {
    pub fn new(timeout: Duration) -> Result<Self, hickory_resolver::ResolveError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())?
            .with_options(opts)
            .build();

        Ok(Self { resolver })
    }
}

#[async_trait]
impl DomainChecker for MxDomainChecker {
    #[tracing::instrument(name = "Checking MX records", skip(self))]
    async fn accepts_mail(&self, domain: &str) -> bool {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => {
                let count = lookup.iter().count();
                tracing::debug!(count, "MX lookup finished");
                count > 0
            }
            Err(e) => {
                tracing::warn!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "MX lookup failed"
                );
                false
            }
        }
    }
}
