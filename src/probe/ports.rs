use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::AcquireError;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::models::{PortFinding, PortScanResults, TargetPortResult};
use crate::probe::service::{resolve_target, ServiceProbe};
use crate::probe::throttle::Throttle;

/// Fans a [`ServiceProbe`] across a fixed port list for a batch of targets.
///
/// Targets run as independent tasks; the ports of one target are polled
/// concurrently. Every connect holds a global and a per-target permit.
pub struct PortProber {
    ports: Arc<Vec<u16>>,
    probe: ServiceProbe,
    throttle: Arc<Throttle>,
    dns_timeout: Duration,
}

impl PortProber {
    pub fn new(ports: Vec<u16>, connect_timeout: Duration, concurrency: usize, per_host: usize) -> Self {
        Self {
            ports: Arc::new(ports),
            probe: ServiceProbe::new(connect_timeout),
            throttle: Arc::new(Throttle::new(concurrency, per_host)),
            dns_timeout: Duration::from_secs(3),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.ports.clone(),
            cfg.connect_timeout(),
            cfg.concurrency as usize,
            cfg.per_host as usize,
        )
        .with_dns_timeout(cfg.dns_timeout())
    }

    pub fn with_dns_timeout(mut self, timeout: Duration) -> Self {
        self.dns_timeout = timeout;
        self
    }

    /// Probe every configured port on every target.
    ///
    /// Targets without open ports are left out of the result. Closed or
    /// unreachable ports are never errors; the only failure is a probe task
    /// that panicked.
    pub async fn probe(&self, targets: &HashSet<String>) -> anyhow::Result<PortScanResults> {
        tracing::info!(targets = targets.len(), ports = self.ports.len(), "Starting port probe");

        let mut tasks = JoinSet::new();
        for target in targets {
            let target = target.clone();
            let ports = self.ports.clone();
            let probe = self.probe;
            let throttle = self.throttle.clone();
            let dns_timeout = self.dns_timeout;
            tasks.spawn(async move { scan_target(target, ports, probe, throttle, dns_timeout).await });
        }

        let mut results = PortScanResults::new();
        while let Some(joined) = tasks.join_next().await {
            let (target, open_ports) = joined.context("port probe task panicked")??;
            if open_ports.is_empty() {
                continue;
            }
            results.insert(
                target.clone(),
                TargetPortResult { target, open_ports, scanned_at: Utc::now() },
            );
        }

        tracing::info!(with_open_ports = results.len(), "Port probe finished");
        Ok(results)
    }
}

async fn scan_target(
    target: String,
    ports: Arc<Vec<u16>>,
    probe: ServiceProbe,
    throttle: Arc<Throttle>,
    dns_timeout: Duration,
) -> anyhow::Result<(String, Vec<PortFinding>)> {
    let ip: IpAddr = match resolve_target(&target, dns_timeout).await {
        Ok(ip) => ip,
        Err(e) => {
            tracing::debug!(host = %target, error = %e, timed_out = e.is_timeout(), "target did not resolve, skipping");
            return Ok((target, Vec::new()));
        }
    };

    let mut open = Vec::new();
    {
        let host = target.as_str();
        let throttle_ref = throttle.as_ref();
        let mut pending: FuturesUnordered<_> = ports
            .iter()
            .copied()
            .map(|port| async move {
                let _permit = throttle_ref.acquire(host).await?;
                Ok::<_, AcquireError>(probe.check(host, ip, port).await)
            })
            .collect();

        while let Some(res) = pending.next().await {
            if let Some(finding) = res.context("throttle closed")? {
                open.push(finding);
            }
        }
    }
    throttle.release_host(&target);

    open.sort_by_key(|f| f.port);
    Ok((target, open))
}
