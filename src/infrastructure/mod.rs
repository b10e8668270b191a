//! Infrastructure layer module
//!
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigLoader};
pub use logging::{LogConfig, LogFormat, LoggerImpl};
