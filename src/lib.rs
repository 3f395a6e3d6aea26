pub mod analyze;
pub mod concurrent;
pub mod config;
pub mod discover;
pub mod errors;
pub mod http_client;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod probe;

// re-export the types callers need to drive a scan
pub use crate::config::Config;
pub use crate::errors::ScanError;
pub use crate::models::{JobId, JobStatusRecord, ScanResult, ScanType};
pub use crate::orchestrator::Orchestrator;
