//! Service configuration.

use bricks_protocol::ops::{names, Limits};
use bricks_protocol::{PROTOCOL_MAX, PROTOCOL_MIN};

/// Service configuration settings.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Minimum supported protocol version.
    pub protocol_min: i32,
    /// Maximum supported protocol version.
    pub protocol_max: i32,
    /// Input size and concurrency limits.
    pub limits: Limits,
    /// Supported operations, reported by probe.
    pub features: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            protocol_min: PROTOCOL_MIN,
            protocol_max: PROTOCOL_MAX,
            limits: Limits::default(),
            features: vec![
                names::PROBE.to_string(),
                names::UPPER_CASE_STRING.to_string(),
            ],
        }
    }
}

impl ServiceConfig {
    /// Override the maximum accepted input size.
    pub fn with_max_input_bytes(mut self, max_input_bytes: u64) -> Self {
        self.limits.max_input_bytes = max_input_bytes;
        self
    }

    /// Override the in-flight request bound. Zero is clamped to one.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.limits.max_in_flight = max_in_flight.max(1);
        self
    }
}
