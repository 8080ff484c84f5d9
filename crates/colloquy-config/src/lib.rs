//! Configuration schema and layered loading for colloquy.
//!
//! Built-in defaults, then an optional YAML file, then environment
//! overrides, validated once at the end.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Loading and override entry points.
pub use loader::{apply_env_overrides, load, load_from_str};
/// Configuration schema models.
pub use model::*;
