use std::time::Duration;

use thiserror::Error;

use crate::models::{JobId, Phase};

/// Errors surfaced by the orchestrator to its caller.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Scan type string is not one of full, subdomain, port, vuln
    #[error("Unknown scan type: {0} (expected one of: full, subdomain, port, vuln)")]
    UnknownScanType(String),

    /// A phase failed and the job was marked failed
    #[error("Scan {job_id} failed during {phase}: {message}")]
    PhaseFailure {
        job_id: JobId,
        phase: Phase,
        message: String,
    },

    /// The cancellation token fired while a phase was running
    #[error("Scan {job_id} cancelled during {phase}")]
    Cancelled { job_id: JobId, phase: Phase },
}

impl ScanError {
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            ScanError::UnknownScanType(_) => None,
            ScanError::PhaseFailure { job_id, .. } | ScanError::Cancelled { job_id, .. } => {
                Some(job_id)
            }
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            ScanError::UnknownScanType(_) => None,
            ScanError::PhaseFailure { phase, .. } | ScanError::Cancelled { phase, .. } => {
                Some(*phase)
            }
        }
    }
}

/// Failure of a single sub-operation (one discovery method, one request).
///
/// These never leave the phase that produced them: the caller logs the
/// reason and carries on with an empty result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    #[error("{tool} failed: {reason}")]
    Failed { tool: String, reason: String },
}

impl ToolError {
    pub fn timeout(tool: impl Into<String>, after: Duration) -> Self {
        ToolError::Timeout { tool: tool.into(), after }
    }

    pub fn failed(tool: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ToolError::Failed { tool: tool.into(), reason: reason.to_string() }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolError::Timeout { .. })
    }
}

/// Success with a value, or empty with the reason it is empty.
pub type ToolOutcome<T> = Result<T, ToolError>;

pub trait OutcomeExt<T> {
    /// Log the failure reason (if any) and fall back to an empty value.
    fn or_empty(self) -> T;
}

impl<T: Default> OutcomeExt<T> for ToolOutcome<T> {
    fn or_empty(self) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "tool produced no result");
                T::default()
            }
        }
    }
}
