//! Caller-Side Components
//!
//! Transports that carry requests to the helper service and the client
//! proxy that negotiates a protocol version and issues calls.

pub mod client;
pub mod transport;

pub use client::{ClientError, ClientResult, FailureKind, HelperClient};
pub use transport::{InProcessTransport, StreamTransport, Transport, TransportError};
