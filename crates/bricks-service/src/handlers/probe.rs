//! Probe operation handler.
//!
//! Reports identity, protocol range and limits. MUST work with
//! protocol_version: 0.

use chrono::Utc;
use bricks_protocol::{
    ops::{ProbeRequest, ProbeResponse},
    RpcError, RpcRequest, SERVICE_NAME, SERVICE_VERSION,
};

use crate::config::ServiceConfig;

/// Schema identifier for the probe payload.
pub const PROBE_SCHEMA_ID: &str = "bricks-helper/probe@1";

/// Handle the probe operation.
///
/// A missing payload is accepted; anything else must be an object.
pub fn handle(request: &RpcRequest, config: &ServiceConfig) -> Result<serde_json::Value, RpcError> {
    if !request.payload.is_null() {
        let _: ProbeRequest = request.decode_payload()?;
    }

    let response = ProbeResponse {
        schema_version: 1,
        schema_id: PROBE_SCHEMA_ID.to_string(),
        created_at: Utc::now(),
        service_name: SERVICE_NAME.to_string(),
        service_version: SERVICE_VERSION.to_string(),
        protocol_min: config.protocol_min,
        protocol_max: config.protocol_max,
        features: config.features.clone(),
        limits: config.limits,
    };

    serde_json::to_value(response).map_err(|e| {
        RpcError::invalid_request(format!("failed to serialize probe response: {}", e))
    })
}
