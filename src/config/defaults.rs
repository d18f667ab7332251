//! Built-in defaults (layer 1)

use bricks_protocol::ops::Limits;
use bricks_protocol::SERVICE_NAME;
use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Per-call timeout in seconds (default: 30)
    pub call_timeout_seconds: u64,

    /// Name the service is vended under
    pub service_name: String,

    /// Service executable (default: "bricks-service", resolved via PATH)
    pub service_path: String,

    /// Largest input the launched service accepts (default: 1 MiB)
    pub max_input_bytes: u64,

    /// In-flight bound of the launched service (default: 64)
    pub max_in_flight: usize,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            call_timeout_seconds: 30,
            service_name: SERVICE_NAME.to_string(),
            service_path: "bricks-service".to_string(),
            max_input_bytes: limits.max_input_bytes,
            max_in_flight: limits.max_in_flight,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "call_timeout_seconds": self.call_timeout_seconds,
            "service": {
                "name": self.service_name,
                "path": self.service_path,
                "max_input_bytes": self.max_input_bytes,
                "max_in_flight": self.max_in_flight
            }
        })
    }
}
