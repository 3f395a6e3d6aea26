use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::discover::DiscoveryMethod;
use crate::errors::{ToolError, ToolOutcome};

const TOOL: &str = "crt.sh";

#[derive(Debug, Deserialize)]
struct CrtShEntry {
    common_name: Option<String>,
    name_value: Option<String>,
}

/// Certificate Transparency lookup against crt.sh.
pub struct CrtShLookup {
    client: Client,
    timeout: Duration,
    base_url: String,
}

impl CrtShLookup {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout, base_url: "https://crt.sh/".to_string() }
    }

    /// Point the lookup at another crt.sh-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn query_url(&self, domain: &str) -> String {
        let q = format!("%.{}", domain);
        format!("{}?q={}&output=json", self.base_url, urlencoding::encode(&q))
    }

    async fn fetch(&self, domain: &str) -> ToolOutcome<String> {
        let url = self.query_url(domain);
        tracing::debug!("Querying crt.sh for domain: {}", domain);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(ToolError::failed(TOOL, format!("returned status: {}", response.status())));
        }

        response.text().await.map_err(|e| classify(e, self.timeout))
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> ToolError {
    if e.is_timeout() {
        ToolError::timeout(TOOL, timeout)
    } else {
        ToolError::failed(TOOL, e)
    }
}

/// Extract subdomains of `domain` from a crt.sh JSON body.
///
/// `name_value` may hold several newline-separated names; wildcard labels
/// are reduced to the name they cover.
pub fn parse_crtsh(body: &str, domain: &str) -> Result<HashSet<String>, serde_json::Error> {
    let entries: Vec<CrtShEntry> = serde_json::from_str(body)?;
    let suffix = format!(".{}", domain);

    let mut subdomains = HashSet::new();
    let names = entries.iter().flat_map(|entry| {
        entry
            .common_name
            .iter()
            .chain(entry.name_value.iter())
            .flat_map(|v| v.split('\n'))
    });

    for name in names {
        let lowered = name.trim().to_lowercase();
        let name = lowered.strip_prefix("*.").unwrap_or(&lowered);
        if name.ends_with(&suffix) {
            subdomains.insert(name.to_string());
        }
    }
    Ok(subdomains)
}

#[async_trait]
impl DiscoveryMethod for CrtShLookup {
    fn name(&self) -> &'static str {
        TOOL
    }

    async fn discover(&self, domain: &str) -> ToolOutcome<HashSet<String>> {
        let body = self.fetch(domain).await?;
        let subdomains = parse_crtsh(&body, domain)
            .map_err(|e| ToolError::failed(TOOL, format!("failed to parse JSON: {}", e)))?;
        tracing::info!("crt.sh found {} subdomains", subdomains.len());
        Ok(subdomains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_crtsh_records() {
        let body = r#"[
            {"common_name": "example.com", "name_value": "example.com\nwww.example.com"},
            {"name_value": "*.api.example.com\nMAIL.example.com "},
            {"name_value": "notexample.com\nexample.com.evil.net"},
            {"common_name": null, "name_value": null}
        ]"#;
        let found = parse_crtsh(body, "example.com").unwrap();
        let mut found: Vec<_> = found.into_iter().collect();
        found.sort();
        assert_eq!(found, vec!["api.example.com", "mail.example.com", "www.example.com"]);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(parse_crtsh("<html>rate limited</html>", "example.com").is_err());
    }

    #[test]
    fn test_query_url_encodes_wildcard() {
        let lookup = CrtShLookup::new(Client::new(), Duration::from_secs(30));
        assert_eq!(
            lookup.query_url("example.com"),
            "https://crt.sh/?q=%25.example.com&output=json"
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_tool_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = sock.read(&mut buf).await;
                let _ = sock
                    .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
            }
        });

        let client = Client::builder().no_proxy().build().unwrap();
        let lookup = CrtShLookup::new(client, Duration::from_secs(5))
            .with_base_url(format!("http://{}/", addr));
        let err = lookup.discover("example.com").await.unwrap_err();
        assert!(matches!(err, ToolError::Failed { .. }));
    }
}
