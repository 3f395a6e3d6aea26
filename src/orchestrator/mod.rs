//! Scan orchestration: phase sequencing and per-job status.
//!
//! A run executes the phases of its scan type strictly in order. Status is
//! published before each phase starts and after it finishes; nothing is
//! written mid-phase. Any error escaping a phase marks the job failed and is
//! returned to the caller as [`ScanError`].

pub mod status;
pub mod tools;

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::analyze::{HeaderAuditor, VulnerabilityProber};
use crate::config::Config;
use crate::discover::SubdomainDiscoverer;
use crate::errors::ScanError;
use crate::http_client::create_scan_client;
use crate::models::{
    JobId, JobState, JobStatusRecord, Phase, ScanPayload, ScanResult, ScanSummary, ScanType,
};
use crate::probe::PortProber;

pub use status::{InMemoryStatusStore, StatusStore};
pub use tools::{PortScan, SubdomainSource, VulnScan};

use status::StatusReporter;

/// Why a phase stopped early.
enum Interrupt {
    Cancelled,
    Failed(anyhow::Error),
}

pub struct Orchestrator {
    subdomains: Arc<dyn SubdomainSource>,
    ports: Arc<dyn PortScan>,
    vulns: Arc<dyn VulnScan>,
    status: Arc<dyn StatusStore>,
}

impl Orchestrator {
    pub fn new(
        subdomains: Arc<dyn SubdomainSource>,
        ports: Arc<dyn PortScan>,
        vulns: Arc<dyn VulnScan>,
    ) -> Self {
        Self {
            subdomains,
            ports,
            vulns,
            status: Arc::new(InMemoryStatusStore::new()),
        }
    }

    /// Wire the network-backed tools described by `cfg`.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let client = create_scan_client(cfg.http_timeout(), cfg.per_host as usize)?;
        let discoverer = SubdomainDiscoverer::from_config(cfg, client.clone());
        let prober = PortProber::from_config(cfg);
        let auditor = HeaderAuditor::new(client, cfg.http_timeout());
        let vulns = VulnerabilityProber::new(auditor, cfg.concurrency as usize);

        Ok(Self::new(Arc::new(discoverer), Arc::new(prober), Arc::new(vulns)))
    }

    pub fn with_status_store(mut self, store: Arc<dyn StatusStore>) -> Self {
        self.status = store;
        self
    }

    /// Current status of `job_id`, or the "unknown" sentinel.
    pub fn get_status(&self, job_id: &JobId) -> JobStatusRecord {
        self.status.get(job_id).unwrap_or_else(JobStatusRecord::unknown)
    }

    /// Record that a job was accepted but has not started.
    pub fn mark_pending(&self, job_id: &JobId) {
        self.status.put(
            job_id,
            JobStatusRecord::new(JobState::Pending, 0, Phase::Initializing, "Queued"),
        );
    }

    /// Run one scan. `scan_type` must be one of full, subdomain, port, vuln.
    pub async fn run(&self, job_id: &JobId, domain: &str, scan_type: &str) -> Result<ScanResult, ScanError> {
        let scan_type: ScanType = scan_type.parse()?;
        self.run_with_cancel(job_id, domain, scan_type, &CancellationToken::new()).await
    }

    /// Run one scan, aborting at the current phase when `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        job_id: &JobId,
        domain: &str,
        scan_type: ScanType,
        cancel: &CancellationToken,
    ) -> Result<ScanResult, ScanError> {
        tracing::info!(job_id = %job_id, domain, scan_type = %scan_type, "Starting scan");
        let mut reporter = StatusReporter::new(job_id, self.status.as_ref());

        let outcome = match scan_type {
            ScanType::Full => self.full_scan(&mut reporter, domain, cancel).await,
            ScanType::Subdomain => self.subdomain_scan(&mut reporter, domain, cancel).await,
            ScanType::Port => self.port_scan(&mut reporter, domain, cancel).await,
            ScanType::Vuln => self.vuln_scan(&mut reporter, domain, cancel).await,
        };

        match outcome {
            Ok((payload, message)) => {
                reporter.complete(message);
                tracing::info!(job_id = %job_id, scan_type = %scan_type, "Scan completed");
                Ok(ScanResult::new(domain, payload))
            }
            Err(interrupt) => {
                let phase = reporter.phase();
                let (message, err) = match interrupt {
                    Interrupt::Cancelled => (
                        format!("{} scan cancelled", scan_type.label()),
                        ScanError::Cancelled { job_id: job_id.clone(), phase },
                    ),
                    Interrupt::Failed(e) => {
                        let message = format!("{} scan failed: {:#}", scan_type.label(), e);
                        let err = ScanError::PhaseFailure {
                            job_id: job_id.clone(),
                            phase,
                            message: message.clone(),
                        };
                        (message, err)
                    }
                };
                tracing::error!(job_id = %job_id, phase = %phase, "{}", message);
                reporter.fail(message);
                Err(err)
            }
        }
    }

    /// Await one phase, unless the token fires first. A panic inside the
    /// phase is reported as a failure of that phase.
    async fn guard<T>(
        cancel: &CancellationToken,
        phase: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, Interrupt> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupt::Cancelled),
            res = AssertUnwindSafe(phase).catch_unwind() => match res {
                Ok(res) => res.map_err(Interrupt::Failed),
                Err(payload) => Err(Interrupt::Failed(anyhow::anyhow!(
                    "phase panicked: {}",
                    panic_message(payload.as_ref())
                ))),
            },
        }
    }

    async fn full_scan(
        &self,
        reporter: &mut StatusReporter<'_>,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<(ScanPayload, String), Interrupt> {
        reporter.running(0, Phase::Initializing, "Initializing...");

        reporter.running(10, Phase::SubdomainEnum, "Enumerating subdomains...");
        let subdomains = Self::guard(cancel, self.subdomains.discover(domain)).await?;

        let mut all_targets: HashSet<String> = subdomains.clone();
        all_targets.insert(domain.to_string());
        reporter.running(30, Phase::SubdomainEnum, format!("Found {} targets", all_targets.len()));

        reporter.running(40, Phase::PortScan, "Scanning ports...");
        let port_results = Self::guard(cancel, self.ports.probe(&all_targets)).await?;
        reporter.running(
            70,
            Phase::PortScan,
            format!("Scanned {} targets", port_results.len()),
        );

        reporter.running(80, Phase::VulnScan, "Scanning vulnerabilities...");
        let vulnerabilities = Self::guard(cancel, self.vulns.probe(&port_results)).await?;
        reporter.running(95, Phase::VulnScan, format!("Found {} potential issues", vulnerabilities.len()));

        let summary = ScanSummary {
            total_subdomains: subdomains.len(),
            total_targets: all_targets.len(),
            targets_with_open_ports: port_results.len(),
            total_vulnerabilities: vulnerabilities.len(),
        };
        let payload = ScanPayload::Full {
            summary,
            subdomains: sorted(subdomains),
            port_scan_results: port_results,
            vulnerabilities,
        };
        Ok((payload, "Scan completed successfully".to_string()))
    }

    async fn subdomain_scan(
        &self,
        reporter: &mut StatusReporter<'_>,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<(ScanPayload, String), Interrupt> {
        reporter.running(0, Phase::SubdomainEnum, "Starting subdomain enumeration...");
        let subdomains = Self::guard(cancel, self.subdomains.discover(domain)).await?;
        let message = format!("Found {} subdomains", subdomains.len());
        reporter.running(90, Phase::SubdomainEnum, message.clone());

        let payload = ScanPayload::Subdomain {
            total_found: subdomains.len(),
            subdomains: sorted(subdomains),
        };
        Ok((payload, message))
    }

    async fn port_scan(
        &self,
        reporter: &mut StatusReporter<'_>,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<(ScanPayload, String), Interrupt> {
        reporter.running(0, Phase::PortScan, "Starting port scan...");
        let targets = HashSet::from([domain.to_string()]);
        let port_results = Self::guard(cancel, self.ports.probe(&targets)).await?;
        reporter.running(
            90,
            Phase::PortScan,
            format!("Found open ports on {} targets", port_results.len()),
        );

        let payload = ScanPayload::Port { port_scan_results: port_results };
        Ok((payload, "Port scan completed".to_string()))
    }

    async fn vuln_scan(
        &self,
        reporter: &mut StatusReporter<'_>,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<(ScanPayload, String), Interrupt> {
        // Vulnerability probing needs service data, so ports go first.
        reporter.running(0, Phase::PortScan, "Starting vulnerability scan...");
        let targets = HashSet::from([domain.to_string()]);
        let port_results = Self::guard(cancel, self.ports.probe(&targets)).await?;
        reporter.running(40, Phase::PortScan, "Port discovery completed");

        reporter.running(50, Phase::VulnScan, "Scanning vulnerabilities...");
        let vulnerabilities = Self::guard(cancel, self.vulns.probe(&port_results)).await?;
        let message = format!("Found {} vulnerabilities", vulnerabilities.len());
        reporter.running(90, Phase::VulnScan, message.clone());

        let payload = ScanPayload::Vuln {
            total_vulnerabilities: vulnerabilities.len(),
            vulnerabilities,
        };
        Ok((payload, message))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn sorted(set: HashSet<String>) -> Vec<String> {
    let mut v: Vec<String> = set.into_iter().collect();
    v.sort();
    v
}
