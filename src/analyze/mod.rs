pub mod security_headers;
pub mod vulnerability;

pub use security_headers::HeaderAuditor;
pub use vulnerability::VulnerabilityProber;
