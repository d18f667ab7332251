//! Operation handlers for the service RPC.
//!
//! Each operation has its own handler module that decodes the payload and
//! returns the reply payload or an [`RpcError`](bricks_protocol::RpcError).

pub mod probe;
pub mod upper_case;
