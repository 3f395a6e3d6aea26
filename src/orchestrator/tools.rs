use std::collections::HashSet;

use async_trait::async_trait;

use crate::analyze::VulnerabilityProber;
use crate::discover::SubdomainDiscoverer;
use crate::models::{PortScanResults, VulnerabilityFinding};
use crate::probe::PortProber;

/// Subdomain discovery phase.
#[async_trait]
pub trait SubdomainSource: Send + Sync {
    async fn discover(&self, domain: &str) -> anyhow::Result<HashSet<String>>;
}

/// Port probing phase.
#[async_trait]
pub trait PortScan: Send + Sync {
    async fn probe(&self, targets: &HashSet<String>) -> anyhow::Result<PortScanResults>;
}

/// Vulnerability probing phase.
#[async_trait]
pub trait VulnScan: Send + Sync {
    async fn probe(&self, port_results: &PortScanResults) -> anyhow::Result<Vec<VulnerabilityFinding>>;
}

#[async_trait]
impl SubdomainSource for SubdomainDiscoverer {
    async fn discover(&self, domain: &str) -> anyhow::Result<HashSet<String>> {
        Ok(SubdomainDiscoverer::discover(self, domain).await)
    }
}

#[async_trait]
impl PortScan for PortProber {
    async fn probe(&self, targets: &HashSet<String>) -> anyhow::Result<PortScanResults> {
        PortProber::probe(self, targets).await
    }
}

#[async_trait]
impl VulnScan for VulnerabilityProber {
    async fn probe(&self, port_results: &PortScanResults) -> anyhow::Result<Vec<VulnerabilityFinding>> {
        VulnerabilityProber::probe(self, port_results).await
    }
}
