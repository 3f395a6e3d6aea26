use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Client;

use crate::errors::{ToolError, ToolOutcome};
use crate::models::{Severity, VulnerabilityFinding};

pub const TOOL: &str = "HeaderScanner";
pub const FINDING_TYPE: &str = "Missing Security Header";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityHeader {
    pub name: &'static str,
    pub description: &'static str,
}

/// Headers every web endpoint is expected to send.
pub const CHECKED_HEADERS: [SecurityHeader; 5] = [
    SecurityHeader { name: "X-Frame-Options", description: "Clickjacking protection missing" },
    SecurityHeader { name: "X-Content-Type-Options", description: "MIME type sniffing protection missing" },
    SecurityHeader { name: "X-XSS-Protection", description: "XSS protection missing" },
    SecurityHeader { name: "Strict-Transport-Security", description: "HSTS missing" },
    SecurityHeader { name: "Content-Security-Policy", description: "CSP missing" },
];

/// Checked headers absent from `headers` (lookup is case-insensitive).
pub fn missing_headers(headers: &HeaderMap) -> Vec<&'static SecurityHeader> {
    CHECKED_HEADERS
        .iter()
        .filter(|h| !headers.contains_key(h.name))
        .collect()
}

/// Fetches one URL and reports each missing security header.
pub struct HeaderAuditor {
    client: Client,
    timeout: Duration,
}

impl HeaderAuditor {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// https on 443, plain http everywhere else.
    pub fn url_for(target: &str, port: u16) -> String {
        let scheme = if port == 443 { "https" } else { "http" };
        if target.contains(':') {
            format!("{}://[{}]:{}", scheme, target, port)
        } else {
            format!("{}://{}:{}", scheme, target, port)
        }
    }

    /// Audit `target:port`. An unreachable endpoint yields no findings.
    pub async fn audit(&self, target: &str, port: u16) -> Vec<VulnerabilityFinding> {
        let url = Self::url_for(target, port);
        let headers = match self.fetch_headers(&url).await {
            Ok(headers) => headers,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "header audit skipped");
                return Vec::new();
            }
        };

        let findings: Vec<VulnerabilityFinding> = missing_headers(&headers)
            .into_iter()
            .map(|h| VulnerabilityFinding {
                target: target.to_string(),
                port,
                vulnerability_type: FINDING_TYPE.to_string(),
                severity: Severity::Medium,
                description: h.description.to_string(),
                tool: TOOL.to_string(),
            })
            .collect();

        tracing::debug!(url = %url, missing = findings.len(), "header audit finished");
        findings
    }

    async fn fetch_headers(&self, url: &str) -> ToolOutcome<HeaderMap> {
        let request = self.client.get(url).timeout(self.timeout).send();
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => Ok(response.headers().clone()),
            Ok(Err(e)) if e.is_timeout() => Err(ToolError::timeout(TOOL, self.timeout)),
            Ok(Err(e)) => Err(ToolError::failed(TOOL, e)),
            Err(_) => Err(ToolError::timeout(TOOL, self.timeout)),
        }
    }
}
