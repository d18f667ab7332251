//! Tracing setup shared by the binaries.
//!
//! Output always goes to stderr: stdout carries protocol bytes.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "BRICKS_LOG";

/// Install the global fmt subscriber. `default_directive` applies when
/// `BRICKS_LOG` is unset or invalid. Repeated calls are no-ops.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
