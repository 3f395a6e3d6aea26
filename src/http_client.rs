use reqwest::{Client, ClientBuilder};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared HTTP client for crt.sh lookups and header audits.
pub fn create_scan_client(timeout: Duration, max_idle_connections: usize) -> reqwest::Result<Client> {
    ClientBuilder::new()
        // Connection pooling - many audits hit the same hosts
        .pool_max_idle_per_host(max_idle_connections)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_nodelay(true)

        // Timeouts
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))

        // Compression
        .gzip(true)
        .brotli(true)

        .use_rustls_tls()
        .https_only(false)
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(USER_AGENT)

        // Audited hosts routinely present self-signed or mismatched certs
        .danger_accept_invalid_certs(true)

        .build()
}
