//! Bricks Helper - caller side of the bricks helper service
//!
//! The service itself lives in `bricks-service` and the contract both sides
//! agree on in `bricks-protocol`. This crate holds the transports, the
//! client proxy and the layered configuration used by the `bricks-helper`
//! CLI.

pub mod config;
pub mod host;

pub use bricks_protocol::{HelperProtocol, Reply, RpcRequest, RpcResponse};
pub use config::{EffectiveConfig, HelperSettings};
pub use host::{ClientError, HelperClient, InProcessTransport, StreamTransport, Transport};
