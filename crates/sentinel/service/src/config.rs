//! Configuration for sentineld

use sentinel_engine::EngineConfig;
use serde::{Deserialize, Serialize};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Detection engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Periodic retrain / health check configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Retrain interval in seconds
    #[serde(default = "default_retrain_interval")]
    pub retrain_interval_secs: u64,

    /// Health check interval in seconds
    #[serde(default = "default_health_interval")]
    pub health_check_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retrain_interval_secs: default_retrain_interval(),
            health_check_interval_secs: default_health_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_retrain_interval() -> u64 {
    3600
}

fn default_health_interval() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServiceConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `SENTINEL__SECTION__KEY` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&ServiceConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with SENTINEL__ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("SENTINEL")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
