// Subdomain discovery: independent methods run concurrently and merged

pub mod crtsh;
pub mod dns;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use crate::config::Config;
use crate::errors::{OutcomeExt, ToolError, ToolOutcome};

pub use crtsh::CrtShLookup;
pub use dns::{DnsDictionary, HickoryResolver, HostResolver};

/// One way of finding subdomains for a domain.
#[async_trait]
pub trait DiscoveryMethod: Send + Sync {
    fn name(&self) -> &'static str;

    async fn discover(&self, domain: &str) -> ToolOutcome<HashSet<String>>;
}

/// Runs every registered [`DiscoveryMethod`] and unions their results.
pub struct SubdomainDiscoverer {
    methods: Vec<Box<dyn DiscoveryMethod>>,
    method_timeout: Duration,
}

impl SubdomainDiscoverer {
    pub fn new(method_timeout: Duration) -> Self {
        Self { methods: Vec::new(), method_timeout }
    }

    /// crt.sh lookup plus DNS dictionary probing.
    pub fn from_config(cfg: &Config, client: reqwest::Client) -> Self {
        Self::new(cfg.discovery_timeout())
            .with_method(CrtShLookup::new(client, cfg.discovery_timeout()))
            .with_method(DnsDictionary::new(
                std::sync::Arc::new(HickoryResolver::new(cfg.dns_timeout())),
                cfg.dns_timeout(),
            ))
    }

    pub fn with_method(mut self, method: impl DiscoveryMethod + 'static) -> Self {
        self.methods.push(Box::new(method));
        self
    }

    pub fn method_names(&self) -> Vec<&'static str> {
        self.methods.iter().map(|m| m.name()).collect()
    }

    /// Discover subdomains of `domain`. Never fails: a method that errors or
    /// exceeds its time bound contributes nothing.
    pub async fn discover(&self, domain: &str) -> HashSet<String> {
        let runs = self.methods.iter().map(|method| async move {
            let outcome = match tokio::time::timeout(self.method_timeout, method.discover(domain)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ToolError::timeout(method.name(), self.method_timeout)),
            };
            (method.name(), outcome)
        });

        let mut subdomains = HashSet::new();
        for (name, outcome) in join_all(runs).await {
            let found = outcome.or_empty();
            tracing::info!(method = name, found = found.len(), "discovery method finished");
            subdomains.extend(found.into_iter().map(|s| s.trim().to_lowercase()));
        }

        subdomains.retain(|s| !s.is_empty() && s != domain);
        subdomains
    }
}
