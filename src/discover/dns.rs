use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use tokio::task::JoinSet;

use crate::discover::DiscoveryMethod;
use crate::errors::ToolOutcome;

/// Labels tried in front of the domain.
pub const COMMON_LABELS: [&str; 15] = [
    "www", "mail", "ftp", "admin", "api", "dev", "test", "staging", "blog", "shop", "app",
    "mobile", "secure", "vpn", "remote",
];

/// Answers "does this name resolve?".
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolves(&self, host: &str) -> bool;
}

/// System-configured hickory resolver.
pub struct HickoryResolver {
    inner: TokioAsyncResolver,
}

impl HickoryResolver {
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                tracing::warn!(error = %e, "could not read system resolver config, using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = timeout;
        opts.attempts = 1;
        Self { inner: TokioAsyncResolver::tokio(config, opts) }
    }
}

#[async_trait]
impl HostResolver for HickoryResolver {
    async fn resolves(&self, host: &str) -> bool {
        match self.inner.lookup_ip(host).await {
            Ok(lookup) => lookup.iter().next().is_some(),
            Err(_) => false,
        }
    }
}

/// DNS dictionary probing over a fixed list of common labels.
pub struct DnsDictionary {
    resolver: Arc<dyn HostResolver>,
    labels: Vec<String>,
    timeout: Duration,
}

impl DnsDictionary {
    pub fn new(resolver: Arc<dyn HostResolver>, timeout: Duration) -> Self {
        Self {
            resolver,
            labels: COMMON_LABELS.iter().map(|s| s.to_string()).collect(),
            timeout,
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

#[async_trait]
impl DiscoveryMethod for DnsDictionary {
    fn name(&self) -> &'static str {
        "dns-dictionary"
    }

    async fn discover(&self, domain: &str) -> ToolOutcome<HashSet<String>> {
        tracing::debug!("Starting DNS dictionary probe for {} labels", self.labels.len());

        let mut tasks = JoinSet::new();
        for label in &self.labels {
            let subdomain = format!("{}.{}", label, domain);
            let resolver = self.resolver.clone();
            let timeout = self.timeout;

            tasks.spawn(async move {
                match tokio::time::timeout(timeout, resolver.resolves(&subdomain)).await {
                    Ok(true) => Some(subdomain),
                    Ok(false) => None,
                    Err(_) => {
                        tracing::trace!(host = %subdomain, "resolution timed out");
                        None
                    }
                }
            });
        }

        let mut found = HashSet::new();
        while let Some(result) = tasks.join_next().await {
            if let Ok(Some(subdomain)) = result {
                found.insert(subdomain);
            }
        }

        tracing::info!("DNS dictionary found {} subdomains", found.len());
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticResolver(HashSet<String>);

    #[async_trait]
    impl HostResolver for StaticResolver {
        async fn resolves(&self, host: &str) -> bool {
            self.0.contains(host)
        }
    }

    struct SlowResolver;

    #[async_trait]
    impl HostResolver for SlowResolver {
        async fn resolves(&self, host: &str) -> bool {
            if host.starts_with("www.") {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            host.starts_with("api.")
        }
    }

    fn static_resolver(names: &[&str]) -> Arc<dyn HostResolver> {
        Arc::new(StaticResolver(names.iter().map(|s| s.to_string()).collect()))
    }

    #[tokio::test]
    async fn test_only_resolving_labels_are_kept() {
        let dict = DnsDictionary::new(
            static_resolver(&["www.example.com", "api.example.com", "unrelated.org"]),
            Duration::from_secs(1),
        );
        let found = dict.discover("example.com").await.unwrap();
        assert_eq!(
            found,
            HashSet::from(["www.example.com".to_string(), "api.example.com".to_string()])
        );
    }

    #[tokio::test]
    async fn test_dictionary_is_idempotent() {
        let dict = DnsDictionary::new(
            static_resolver(&["mail.example.com", "vpn.example.com"]),
            Duration::from_secs(1),
        );
        let first = dict.discover("example.com").await.unwrap();
        let second = dict.discover("example.com").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn test_slow_label_is_excluded_not_fatal() {
        let dict = DnsDictionary::new(Arc::new(SlowResolver), Duration::from_millis(100))
            .with_labels(vec!["www".into(), "api".into()]);
        let found = dict.discover("example.com").await.unwrap();
        assert_eq!(found, HashSet::from(["api.example.com".to_string()]));
    }
}
