use serde::{Deserialize, Serialize};

/// Main configuration structure for wbstack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Preview loop configuration
    #[serde(default)]
    pub previewer: PreviewerConfig,

    /// Reference solver configuration
    #[serde(default)]
    pub solver: SolverConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Preview loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PreviewerConfig {
    /// Simulation step in seconds (one control period)
    #[serde(default = "default_control_period")]
    pub control_period: f64,

    /// Duration used when a run does not specify one, in seconds
    #[serde(default = "default_duration")]
    pub default_duration: f64,
}

const fn default_control_period() -> f64 {
    3e-3
}

const fn default_duration() -> f64 {
    1.0
}

impl Default for PreviewerConfig {
    fn default() -> Self {
        Self {
            control_period: default_control_period(),
            default_duration: default_duration(),
        }
    }
}

/// Reference solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SolverConfig {
    /// Singular values below this are treated as zero in pseudo-inverses
    #[serde(default = "default_pinv_tolerance")]
    pub pinv_tolerance: f64,

    /// Condition number above which a level is reported as singular
    #[serde(default = "default_condition_limit")]
    pub condition_limit: f64,

    /// Allowed constraint violation
    #[serde(default = "default_constraint_tolerance")]
    pub constraint_tolerance: f64,
}

const fn default_pinv_tolerance() -> f64 {
    1e-9
}

const fn default_condition_limit() -> f64 {
    1e8
}

const fn default_constraint_tolerance() -> f64 {
    1e-6
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            pinv_tolerance: default_pinv_tolerance(),
            condition_limit: default_condition_limit(),
            constraint_tolerance: default_constraint_tolerance(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
