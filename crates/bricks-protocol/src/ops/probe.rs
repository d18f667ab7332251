//! Probe operation types.
//!
//! The probe operation reports the service's identity, supported protocol
//! range and limits. It is the only operation valid at protocol_version 0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Probe request payload (empty).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeRequest {}

/// Probe response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// Schema version for this payload.
    pub schema_version: i32,
    /// Schema identifier.
    pub schema_id: String,
    /// When this snapshot was created.
    pub created_at: DateTime<Utc>,
    /// Name the service is vended under.
    pub service_name: String,
    /// Version of the running service.
    pub service_version: String,
    /// Minimum protocol version supported.
    pub protocol_min: i32,
    /// Maximum protocol version supported.
    pub protocol_max: i32,
    /// Operations and feature flags supported by this service.
    pub features: Vec<String>,
    /// Request limits.
    pub limits: Limits,
}

/// Limits enforced by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Largest accepted input, in UTF-8 bytes.
    pub max_input_bytes: u64,
    /// Requests handled concurrently before answering BUSY.
    pub max_in_flight: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_bytes: 1024 * 1024, // 1 MiB
            max_in_flight: 64,
        }
    }
}
