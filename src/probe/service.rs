use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::net::TcpStream;

use crate::errors::{ToolError, ToolOutcome};
use crate::models::PortFinding;

/// Well-known port to service name.
static SERVICES: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (21, "ftp"),
        (22, "ssh"),
        (23, "telnet"),
        (25, "smtp"),
        (53, "dns"),
        (80, "http"),
        (110, "pop3"),
        (143, "imap"),
        (443, "https"),
        (993, "imaps"),
        (995, "pop3s"),
        (3306, "mysql"),
        (5432, "postgresql"),
        (6379, "redis"),
        (27017, "mongodb"),
    ])
});

/// Identify a service by port number, "unknown" when not in the table.
pub fn service_for_port(port: u16) -> &'static str {
    SERVICES.get(&port).copied().unwrap_or("unknown")
}

/// Resolve a hostname (or IP literal) to its first address.
pub async fn resolve_target(host: &str, timeout: Duration) -> ToolOutcome<IpAddr> {
    let lookup = tokio::net::lookup_host((host, 0));
    match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(mut addrs)) => addrs
            .next()
            .map(|a| a.ip())
            .ok_or_else(|| ToolError::failed("resolver", format!("no address for {}", host))),
        Ok(Err(e)) => Err(ToolError::failed("resolver", e)),
        Err(_) => Err(ToolError::timeout("resolver", timeout)),
    }
}

/// Connect-style reachability check against one host:port.
#[derive(Debug, Clone, Copy)]
pub struct ServiceProbe {
    timeout: Duration,
}

impl ServiceProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Probe one port. Refused, timed-out and errored connects all count as closed.
    pub async fn check(&self, host: &str, ip: IpAddr, port: u16) -> Option<PortFinding> {
        match self.connect(SocketAddr::new(ip, port)).await {
            Ok(()) => {
                let service = service_for_port(port);
                tracing::debug!(host, port, service, "port open");
                Some(PortFinding::open(port, service))
            }
            Err(e) => {
                tracing::trace!(host, port, error = %e, "port closed");
                None
            }
        }
    }

    async fn connect(&self, addr: SocketAddr) -> ToolOutcome<()> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(ToolError::failed("tcp-connect", e)),
            Err(_) => Err(ToolError::timeout("tcp-connect", self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_service_table() {
        assert_eq!(service_for_port(80), "http");
        assert_eq!(service_for_port(22), "ssh");
        assert_eq!(service_for_port(443), "https");
        assert_eq!(service_for_port(27017), "mongodb");
        assert_eq!(service_for_port(9999), "unknown");
    }

    #[tokio::test]
    async fn test_check_open_and_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();

        // Grab a free port, then close it so nothing listens there
        let closed_port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };

        let probe = ServiceProbe::new(Duration::from_millis(500));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        let found = probe.check("localhost", ip, open_port).await.unwrap();
        assert_eq!(found.port, open_port);
        assert_eq!(found.state, "open");
        assert!(probe.check("localhost", ip, closed_port).await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let ip = resolve_target("127.0.0.1", Duration::from_secs(1)).await.unwrap();
        assert!(ip.is_loopback());
    }
}
