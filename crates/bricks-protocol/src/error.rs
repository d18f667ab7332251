//! Error types for the RPC protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes returned in RPC error responses.
///
/// The uppercase operation itself never fails; every code here is raised by
/// the envelope handling and dispatch around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed JSON, missing required fields, or invalid field values.
    InvalidRequest,
    /// Protocol version is outside the supported range.
    UnsupportedProtocol,
    /// Unknown operation requested.
    UnknownOperation,
    /// Input exceeds the service's maximum accepted size.
    PayloadTooLarge,
    /// The implementation released its reply callback without invoking it.
    ReplyDropped,
    /// Service is at its in-flight limit.
    Busy,
    /// The implementation faulted while handling the request.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::UnsupportedProtocol => write!(f, "UNSUPPORTED_PROTOCOL"),
            Self::UnknownOperation => write!(f, "UNKNOWN_OPERATION"),
            Self::PayloadTooLarge => write!(f, "PAYLOAD_TOO_LARGE"),
            Self::ReplyDropped => write!(f, "REPLY_DROPPED"),
            Self::Busy => write!(f, "BUSY"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// RPC error response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code from the registry.
    pub code: ErrorCode,
    /// Human-readable, single-line error message.
    pub message: String,
    /// Optional machine-readable details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// Create a new RPC error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new RPC error with additional data.
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create an INVALID_REQUEST error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Create an UNSUPPORTED_PROTOCOL error.
    pub fn unsupported_protocol(version: i32, min: i32, max: i32) -> Self {
        Self::with_data(
            ErrorCode::UnsupportedProtocol,
            format!("protocol_version {} is outside supported range [{}, {}]", version, min, max),
            serde_json::json!({
                "requested": version,
                "min": min,
                "max": max
            }),
        )
    }

    /// Create an UNKNOWN_OPERATION error.
    pub fn unknown_operation(op: &str) -> Self {
        Self::with_data(
            ErrorCode::UnknownOperation,
            format!("unknown operation: {}", op),
            serde_json::json!({ "op": op }),
        )
    }

    /// Create a PAYLOAD_TOO_LARGE error.
    pub fn payload_too_large(size: u64, max: u64) -> Self {
        Self::with_data(
            ErrorCode::PayloadTooLarge,
            format!("payload size {} exceeds maximum {}", size, max),
            serde_json::json!({ "size": size, "max_bytes": max }),
        )
    }

    /// Create a REPLY_DROPPED error.
    pub fn reply_dropped() -> Self {
        Self::new(
            ErrorCode::ReplyDropped,
            "service released the reply callback without replying",
        )
    }

    /// Create a BUSY error.
    pub fn busy(max_in_flight: usize) -> Self {
        Self::with_data(
            ErrorCode::Busy,
            format!("service has {} requests in flight", max_in_flight),
            serde_json::json!({ "max_in_flight": max_in_flight }),
        )
    }

    /// Create an INTERNAL error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}
