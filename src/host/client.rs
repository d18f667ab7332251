//! Helper Client
//!
//! Caller-side proxy for the helper service. Handles protocol negotiation
//! and maps error replies onto [`ClientError`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bricks_protocol::ops::{
    names, Limits, ProbeRequest, ProbeResponse, UpperCaseRequest, UpperCaseResponse,
};
use bricks_protocol::{
    ErrorCode, RpcError, RpcRequest, RpcResponse, PROTOCOL_MAX, PROTOCOL_MIN,
    PROTOCOL_VERSION_PROBE, SERVICE_NAME,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::transport::{Transport, TransportError};

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Service incompatible: {0}")]
    ServiceIncompatible(String),

    #[error("Version negotiation failed: host [{host_min},{host_max}] vs service [{service_min},{service_max}]")]
    VersionNegotiationFailed {
        host_min: i32,
        host_max: i32,
        service_min: i32,
        service_max: i32,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Payload too large: max {max_bytes} bytes")]
    PayloadTooLarge { max_bytes: u64 },

    #[error("Service busy")]
    Busy,

    #[error("Service dropped the reply")]
    ReplyDropped,

    #[error("Service fault: {0}")]
    ServiceFault(String),

    #[error("Connection invalidated")]
    Invalidated,
}

/// Failure kind for exit code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Launch/transport failures (exit code 20)
    Transport = 20,
    /// Request rejected by the service (exit code 40)
    Rejected = 40,
    /// Service accepted the call but produced no reply (exit code 50)
    NoReply = 50,
    /// Service busy (exit code 90)
    Busy = 90,
    /// Service incompatible (exit code 91)
    Incompatible = 91,
}

impl ClientError {
    /// Map error to failure kind for exit code
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ClientError::Transport(_) => FailureKind::Transport,
            ClientError::Protocol(_) => FailureKind::Transport,
            ClientError::Invalidated => FailureKind::Transport,
            ClientError::ServiceIncompatible(_) => FailureKind::Incompatible,
            ClientError::VersionNegotiationFailed { .. } => FailureKind::Incompatible,
            ClientError::InvalidRequest(_) => FailureKind::Rejected,
            ClientError::PayloadTooLarge { .. } => FailureKind::Rejected,
            ClientError::ReplyDropped => FailureKind::NoReply,
            ClientError::ServiceFault(_) => FailureKind::NoReply,
            ClientError::Busy => FailureKind::Busy,
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.failure_kind() as i32
    }
}

impl From<RpcError> for ClientError {
    fn from(error: RpcError) -> Self {
        match error.code {
            ErrorCode::Busy => ClientError::Busy,
            ErrorCode::UnsupportedProtocol | ErrorCode::UnknownOperation => {
                ClientError::ServiceIncompatible(error.message)
            }
            ErrorCode::PayloadTooLarge => {
                let max = error
                    .data
                    .as_ref()
                    .and_then(|d| d.get("max_bytes"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                ClientError::PayloadTooLarge { max_bytes: max }
            }
            ErrorCode::ReplyDropped => ClientError::ReplyDropped,
            ErrorCode::InvalidRequest => ClientError::InvalidRequest(error.message),
            ErrorCode::Internal => ClientError::ServiceFault(error.message),
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Caller-side proxy for the helper service
pub struct HelperClient {
    transport: Arc<dyn Transport>,
    /// Name the service must report in its probe
    service_name: String,
    /// Negotiated protocol version (set after probe)
    negotiated_version: Option<i32>,
    /// Service limits (set after probe)
    limits: Option<Limits>,
    /// Host supported protocol range
    host_protocol_min: i32,
    host_protocol_max: i32,
    request_counter: AtomicU64,
    invalidated: AtomicBool,
}

impl HelperClient {
    /// Create a new client over the given transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            service_name: SERVICE_NAME.to_string(),
            negotiated_version: None,
            limits: None,
            host_protocol_min: PROTOCOL_MIN,
            host_protocol_max: PROTOCOL_MAX,
            request_counter: AtomicU64::new(0),
            invalidated: AtomicBool::new(false),
        }
    }

    /// Expect the service to identify itself as `name` instead of the default
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// The negotiated protocol version, if probe has run
    pub fn negotiated_version(&self) -> Option<i32> {
        self.negotiated_version
    }

    /// Generate a unique request ID
    fn next_request_id(&self) -> String {
        let counter = self.request_counter.fetch_add(1, Ordering::SeqCst);
        let timestamp = chrono::Utc::now().timestamp_millis();
        format!("req-{:x}-{:08x}", timestamp, counter)
    }

    fn ensure_valid(&self) -> ClientResult<()> {
        if self.invalidated.load(Ordering::SeqCst) {
            return Err(ClientError::Invalidated);
        }
        Ok(())
    }

    /// Get the negotiated protocol version, or fail if not negotiated yet
    fn protocol_version(&self) -> ClientResult<i32> {
        self.negotiated_version.ok_or_else(|| {
            ClientError::Protocol("Protocol version not negotiated - call probe() first".to_string())
        })
    }

    /// Send a request, check correlation, decode the success payload.
    async fn call<T: DeserializeOwned>(&self, request: RpcRequest) -> ClientResult<T> {
        self.ensure_valid()?;
        let request_id = request.request_id.clone();

        let response: RpcResponse = self.transport.execute(&request).await?;
        if response.request_id != request_id {
            return Err(ClientError::Protocol(format!(
                "response for '{}' answered request '{}'",
                response.request_id, request_id
            )));
        }

        let payload = response.into_result()?;
        serde_json::from_value(payload).map_err(|e| {
            ClientError::Protocol(format!("invalid {} reply payload: {}", request.op, e))
        })
    }

    // === Public Operations ===

    /// Probe the service for capabilities
    ///
    /// This must be called first to negotiate protocol version.
    pub async fn probe(&mut self) -> ClientResult<ProbeResponse> {
        let payload = serde_json::to_value(ProbeRequest::default())
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        let request = RpcRequest::new(PROTOCOL_VERSION_PROBE, names::PROBE, self.next_request_id(), payload);
        let probe: ProbeResponse = self.call(request).await?;

        if probe.service_name != self.service_name {
            warn!(expected = %self.service_name, found = %probe.service_name, "unexpected service");
            return Err(ClientError::ServiceIncompatible(format!(
                "expected service '{}', found '{}'",
                self.service_name, probe.service_name
            )));
        }

        // Negotiate version: use max of intersection
        let intersection_min = self.host_protocol_min.max(probe.protocol_min);
        let intersection_max = self.host_protocol_max.min(probe.protocol_max);

        if intersection_min > intersection_max {
            return Err(ClientError::VersionNegotiationFailed {
                host_min: self.host_protocol_min,
                host_max: self.host_protocol_max,
                service_min: probe.protocol_min,
                service_max: probe.protocol_max,
            });
        }

        info!(
            service = %probe.service_name,
            version = %probe.service_version,
            protocol = intersection_max,
            "negotiated protocol"
        );
        self.negotiated_version = Some(intersection_max);
        self.limits = Some(probe.limits);
        Ok(probe)
    }

    /// Ask the service to uppercase `input`; resolves with its single reply
    pub async fn upper_case_string(&self, input: &str) -> ClientResult<String> {
        let version = self.protocol_version()?;

        // Oversized lines are rejected before they can be correlated, so
        // check the advertised limit here.
        if let Some(limits) = self.limits {
            if input.len() as u64 > limits.max_input_bytes {
                return Err(ClientError::PayloadTooLarge {
                    max_bytes: limits.max_input_bytes,
                });
            }
        }

        let payload = serde_json::to_value(UpperCaseRequest {
            string: input.to_string(),
        })
        .map_err(|e| ClientError::Protocol(e.to_string()))?;

        let request = RpcRequest::new(version, names::UPPER_CASE_STRING, self.next_request_id(), payload);
        debug!(request_id = %request.request_id, bytes = input.len(), "upper_case_string");

        let reply: UpperCaseResponse = self.call(request).await?;
        Ok(reply.string)
    }

    /// Invalidate the connection; every later call fails with `Invalidated`
    pub async fn invalidate(&self) {
        if !self.invalidated.swap(true, Ordering::SeqCst) {
            self.transport.close().await;
        }
    }
}
