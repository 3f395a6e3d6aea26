use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Ports probed when no explicit list is configured.
pub const DEFAULT_PORTS: [u16; 15] = [
    21, 22, 23, 25, 53, 80, 110, 143, 443, 993, 995, 3306, 5432, 6379, 27017,
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Global cap on in-flight probes (sockets / HTTP requests)
    pub concurrency: u16,
    /// Cap on in-flight connects against a single target
    pub per_host: u16,
    pub connect_timeout_ms: u64,
    pub http_timeout_secs: u64,
    pub discovery_timeout_secs: u64,
    pub dns_timeout_ms: u64,
    pub ports: Vec<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: 50,
            per_host: 6,
            connect_timeout_ms: 2_000,
            http_timeout_secs: 10,
            discovery_timeout_secs: 30,
            dns_timeout_ms: 3_000,
            ports: DEFAULT_PORTS.to_vec(),
        }
    }
}

impl Config {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        cfg.validated()
    }

    /// Apply a timing template, T0 (paranoid) to T5 (insane), like nmap -T.
    pub fn with_timing(mut self, timing: u8) -> Self {
        let (concurrency, per_host) = match timing {
            0 => (1, 1),
            1 => (5, 1),
            2 => (15, 2),
            3 => (50, 6),
            4 => (100, 12),
            5 => (200, 20),
            _ => (50, 6),
        };
        self.concurrency = concurrency;
        self.per_host = per_host;
        self
    }

    pub fn validated(self) -> anyhow::Result<Self> {
        if self.concurrency == 0 || self.per_host == 0 {
            anyhow::bail!("concurrency and per_host must be at least 1");
        }
        if self.ports.iter().any(|p| *p == 0) {
            anyhow::bail!("port 0 is not a valid probe target");
        }
        Ok(self)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"concurrency": 8, "ports": [80, 443]}"#).unwrap();
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.per_host, 6);
        assert_eq!(cfg.ports, vec![80, 443]);
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_timing_templates() {
        let cfg = Config::default().with_timing(0);
        assert_eq!((cfg.concurrency, cfg.per_host), (1, 1));
        let cfg = Config::default().with_timing(5);
        assert_eq!((cfg.concurrency, cfg.per_host), (200, 20));
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let cfg = Config { concurrency: 0, ..Config::default() };
        assert!(cfg.validated().is_err());
        assert!(Config::default().validated().is_ok());
    }
}
