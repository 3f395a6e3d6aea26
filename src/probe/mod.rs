// Port probing: single connect checks, fan-out across targets, connection limits

pub mod ports;
pub mod service;
pub mod throttle;

pub use ports::PortProber;
pub use service::{service_for_port, ServiceProbe};
pub use throttle::Throttle;
