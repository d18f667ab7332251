//! `upper_case_string` operation handler.

use bricks_protocol::{
    ops::{UpperCaseRequest, UpperCaseResponse},
    HelperProtocol, Reply, RpcError, RpcRequest,
};
use tracing::warn;

use crate::config::ServiceConfig;

/// Handle the upper_case_string operation.
///
/// Hands the input to `service` and waits for its reply callback. A callback
/// released without a reply becomes a REPLY_DROPPED error.
pub async fn handle(
    request: &RpcRequest,
    config: &ServiceConfig,
    service: &dyn HelperProtocol,
) -> Result<serde_json::Value, RpcError> {
    let payload: UpperCaseRequest = request.decode_payload()?;

    let size = payload.string.len() as u64;
    if size > config.limits.max_input_bytes {
        return Err(RpcError::payload_too_large(size, config.limits.max_input_bytes));
    }

    let (reply, pending) = Reply::channel();
    service.upper_case_string(payload.string, reply);

    let string = pending.await.map_err(|_| {
        warn!(request_id = %request.request_id, "reply callback dropped without a reply");
        RpcError::reply_dropped()
    })?;

    serde_json::to_value(UpperCaseResponse { string }).map_err(|e| {
        RpcError::invalid_request(format!("failed to serialize reply: {}", e))
    })
}
