use std::sync::Arc;

use crate::analyze::security_headers::HeaderAuditor;
use crate::concurrent::ConcurrentProbe;
use crate::models::{PortScanResults, VulnerabilityFinding};

/// Runs the header audit against every open web port in a port scan.
pub struct VulnerabilityProber {
    auditor: Arc<HeaderAuditor>,
    executor: ConcurrentProbe,
}

impl VulnerabilityProber {
    pub fn new(auditor: HeaderAuditor, concurrency: usize) -> Self {
        Self {
            auditor: Arc::new(auditor),
            executor: ConcurrentProbe::new(concurrency),
        }
    }

    /// Audit every http/https port; other services are never contacted.
    pub async fn probe(&self, port_results: &PortScanResults) -> anyhow::Result<Vec<VulnerabilityFinding>> {
        let web_endpoints: Vec<(String, u16)> = port_results
            .values()
            .flat_map(|r| {
                r.open_ports
                    .iter()
                    .filter(|p| p.is_web())
                    .map(move |p| (r.target.clone(), p.port))
            })
            .collect();

        tracing::info!(endpoints = web_endpoints.len(), "Starting vulnerability probe");

        let auditor = self.auditor.clone();
        let per_endpoint = self
            .executor
            .execute(web_endpoints, move |(target, port)| {
                let auditor = auditor.clone();
                async move { auditor.audit(&target, port).await }
            })
            .await?;

        let findings: Vec<VulnerabilityFinding> = per_endpoint.into_iter().flatten().collect();
        tracing::info!(findings = findings.len(), "Vulnerability probe finished");
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PortFinding, TargetPortResult};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// HTTP server that sends only X-Frame-Options and counts requests.
    async fn counting_server(hits: Arc<AtomicUsize>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                hits.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                let _ = sock
                    .write_all(b"HTTP/1.1 200 OK\r\nX-Frame-Options: DENY\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
            }
        });
        port
    }

    fn prober() -> VulnerabilityProber {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        VulnerabilityProber::new(HeaderAuditor::new(client, Duration::from_secs(5)), 4)
    }

    #[tokio::test]
    async fn test_only_web_services_are_audited() {
        let web_hits = Arc::new(AtomicUsize::new(0));
        let web_port = counting_server(web_hits.clone()).await;
        let ssh_hits = Arc::new(AtomicUsize::new(0));
        let ssh_port = counting_server(ssh_hits.clone()).await;

        let mut results = PortScanResults::new();
        results.insert(
            "127.0.0.1".to_string(),
            TargetPortResult {
                target: "127.0.0.1".to_string(),
                open_ports: vec![PortFinding::open(web_port, "http"), PortFinding::open(ssh_port, "ssh")],
                scanned_at: Utc::now(),
            },
        );

        let findings = prober().probe(&results).await.unwrap();
        assert_eq!(findings.len(), 4);
        assert!(findings.iter().all(|f| f.port == web_port));
        assert_eq!(web_hits.load(Ordering::SeqCst), 1);
        assert_eq!(ssh_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_port_results() {
        let findings = prober().probe(&PortScanResults::new()).await.unwrap();
        assert!(findings.is_empty());
    }
}
