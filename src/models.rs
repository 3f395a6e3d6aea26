use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ScanError;

/// Opaque, caller-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for JobId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Full,
    Subdomain,
    Port,
    Vuln,
}

impl ScanType {
    pub const ALL: [ScanType; 4] = [ScanType::Full, ScanType::Subdomain, ScanType::Port, ScanType::Vuln];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Full => "full",
            ScanType::Subdomain => "subdomain",
            ScanType::Port => "port",
            ScanType::Vuln => "vuln",
        }
    }

    /// Human label used in status messages ("Port scan failed: ...").
    pub fn label(&self) -> &'static str {
        match self {
            ScanType::Full => "Full",
            ScanType::Subdomain => "Subdomain",
            ScanType::Port => "Port",
            ScanType::Vuln => "Vulnerability",
        }
    }
}

impl FromStr for ScanType {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(ScanType::Full),
            "subdomain" => Ok(ScanType::Subdomain),
            "port" => Ok(ScanType::Port),
            "vuln" => Ok(ScanType::Vuln),
            other => Err(ScanError::UnknownScanType(other.to_string())),
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Unknown,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initializing,
    SubdomainEnum,
    PortScan,
    VulnScan,
    Completed,
    Unknown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initializing => "initializing",
            Phase::SubdomainEnum => "subdomain_enum",
            Phase::PortScan => "port_scan",
            Phase::VulnScan => "vuln_scan",
            Phase::Completed => "completed",
            Phase::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one job, as seen by external status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusRecord {
    pub status: JobState,
    pub progress: u8,
    #[serde(rename = "current_phase")]
    pub phase: Phase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobStatusRecord {
    pub fn new(status: JobState, progress: u8, phase: Phase, message: impl Into<String>) -> Self {
        Self {
            status,
            progress: progress.min(100),
            phase,
            message: message.into(),
            updated_at: Some(Utc::now()),
        }
    }

    /// Sentinel returned for job ids that have no status yet.
    pub fn unknown() -> Self {
        Self {
            status: JobState::Unknown,
            progress: 0,
            phase: Phase::Unknown,
            message: "Scan status not found".to_string(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortFinding {
    pub port: u16,
    pub service: String,
    pub state: String,
}

impl PortFinding {
    pub fn open(port: u16, service: impl Into<String>) -> Self {
        Self { port, service: service.into(), state: "open".to_string() }
    }

    pub fn is_web(&self) -> bool {
        self.service == "http" || self.service == "https"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPortResult {
    pub target: String,
    pub open_ports: Vec<PortFinding>,
    pub scanned_at: DateTime<Utc>,
}

/// Open ports keyed by target. Targets without open ports are absent.
pub type PortScanResults = HashMap<String, TargetPortResult>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    pub target: String,
    pub port: u16,
    pub vulnerability_type: String,
    pub severity: Severity,
    pub description: String,
    pub tool: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total_subdomains: usize,
    pub total_targets: usize,
    pub targets_with_open_ports: usize,
    pub total_vulnerabilities: usize,
}

/// Per-scan-type outputs carried by a [`ScanResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scan_type", rename_all = "lowercase")]
pub enum ScanPayload {
    Full {
        summary: ScanSummary,
        subdomains: Vec<String>,
        port_scan_results: PortScanResults,
        vulnerabilities: Vec<VulnerabilityFinding>,
    },
    Subdomain {
        subdomains: Vec<String>,
        total_found: usize,
    },
    Port {
        port_scan_results: PortScanResults,
    },
    Vuln {
        vulnerabilities: Vec<VulnerabilityFinding>,
        total_vulnerabilities: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub target_domain: String,
    pub scan_completed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: ScanPayload,
}

impl ScanResult {
    pub fn new(target_domain: &str, payload: ScanPayload) -> Self {
        Self {
            target_domain: target_domain.to_string(),
            scan_completed_at: Utc::now(),
            payload,
        }
    }

    pub fn scan_type(&self) -> ScanType {
        match self.payload {
            ScanPayload::Full { .. } => ScanType::Full,
            ScanPayload::Subdomain { .. } => ScanType::Subdomain,
            ScanPayload::Port { .. } => ScanType::Port,
            ScanPayload::Vuln { .. } => ScanType::Vuln,
        }
    }

    pub fn summary(&self) -> Option<&ScanSummary> {
        match &self.payload {
            ScanPayload::Full { summary, .. } => Some(summary),
            _ => None,
        }
    }
}
