//! Bricks Helper Protocol
//!
//! The service contract vended by the bricks helper and the JSON envelope
//! that carries it across a process boundary.

pub mod contract;
pub mod error;
pub mod ops;
pub mod request;
pub mod response;

pub use contract::{HelperProtocol, PendingReply, Reply, ReplyDropped};
pub use error::{ErrorCode, RpcError};
pub use request::RpcRequest;
pub use response::RpcResponse;

/// Protocol version used for probe requests (sentinel value).
pub const PROTOCOL_VERSION_PROBE: i32 = 0;

/// Minimum protocol version supported by this implementation.
pub const PROTOCOL_MIN: i32 = 1;

/// Maximum protocol version supported by this implementation.
pub const PROTOCOL_MAX: i32 = 1;

/// Name the service is vended under.
pub const SERVICE_NAME: &str = "com.idorabin.bricksHelper";

/// Current service version string.
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
