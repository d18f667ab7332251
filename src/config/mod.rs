//! Caller-side configuration
//!
//! Implements the 3-layer configuration merge:
//! 1. Built-in defaults
//! 2. Config file (~/.config/bricks/helper.toml or --config)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    default_config_path, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, HelperSettings,
    ServiceSettings,
};
pub use merge::{deep_merge, merge_layers};
