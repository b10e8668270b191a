use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid control_period: {0}. Must be positive and finite")]
    InvalidControlPeriod(f64),

    #[error("Invalid default_duration: {0}. Must be positive and finite")]
    InvalidDuration(f64),

    #[error("Invalid pinv_tolerance: {0}. Must be positive")]
    InvalidPinvTolerance(f64),

    #[error("Invalid condition_limit: {0}. Must be greater than 1")]
    InvalidConditionLimit(f64),

    #[error("Invalid constraint_tolerance: {0}. Must be non-negative")]
    InvalidConstraintTolerance(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .wbstack/config.yaml (project config)
    /// 3. .wbstack/local.yaml (local overrides, optional)
    /// 4. Environment variables (WBSTACK_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, with environment overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("WBSTACK_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".wbstack/config.yaml"))
            .merge(Yaml::file(".wbstack/local.yaml"))
            .merge(Env::prefixed("WBSTACK_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let previewer = &config.previewer;
        if !is_positive(previewer.control_period) {
            return Err(ConfigError::InvalidControlPeriod(previewer.control_period));
        }
        if !is_positive(previewer.default_duration) {
            return Err(ConfigError::InvalidDuration(previewer.default_duration));
        }

        let solver = &config.solver;
        if !is_positive(solver.pinv_tolerance) {
            return Err(ConfigError::InvalidPinvTolerance(solver.pinv_tolerance));
        }
        if solver.condition_limit.is_nan() || solver.condition_limit <= 1.0 {
            return Err(ConfigError::InvalidConditionLimit(solver.condition_limit));
        }
        if !solver.constraint_tolerance.is_finite() || solver.constraint_tolerance < 0.0 {
            return Err(ConfigError::InvalidConstraintTolerance(solver.constraint_tolerance));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
