//! RPC request types.

use serde::{Deserialize, Serialize};

/// RPC request envelope.
///
/// One JSON object per line on the service's input stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol version (selected by the caller after probe).
    /// For probe requests, this MUST be 0.
    pub protocol_version: i32,
    /// Operation name.
    pub op: String,
    /// Caller-chosen request ID for correlation.
    pub request_id: String,
    /// Operation-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RpcRequest {
    /// Build a request for `op` with the given payload.
    pub fn new(
        protocol_version: i32,
        op: impl Into<String>,
        request_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            protocol_version,
            op: op.into(),
            request_id: request_id.into(),
            payload,
        }
    }

    /// Decode the payload into an operation-specific request type.
    pub fn decode_payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::RpcError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            crate::RpcError::invalid_request(format!("invalid {} payload: {}", self.op, e))
        })
    }
}
