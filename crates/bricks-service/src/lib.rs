//! Bricks Helper Service
//!
//! The concrete implementation of the bricks helper contract, plus the
//! dispatcher that speaks the line-delimited JSON envelope on a byte stream.
//!
//! This crate can be used in two modes:
//! - **Standalone binary**: `bricks-service rpc` / `bricks-service serve`
//! - **In-process library**: the caller side and tests drive [`RpcHandler`]
//!   directly

pub mod config;
pub mod handlers;
pub mod helper;
pub mod logging;
pub mod rpc;

pub use config::ServiceConfig;
pub use helper::BricksHelper;
pub use rpc::RpcHandler;
