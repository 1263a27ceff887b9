//! Configuration loading and management.
//!
//! The whole application configuration lives in
//! `.research-kit/config.toml` under the project root. It is loaded once at
//! program entry into an explicit [`models::AppConfig`] and passed by
//! reference from there on; there is no global cache.

pub mod error;
pub mod loader;
pub mod models;

pub use error::{ConfigError, ConfigResult};
pub use loader::load_config;
pub use models::AppConfig;
