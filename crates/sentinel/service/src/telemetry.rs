//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ServiceError, ServiceResult};

/// Filter from `RUST_LOG` when set, otherwise from the configured level.
pub fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

/// Install the global subscriber: plain or JSON formatted.
pub fn init_tracing(logging: &LoggingConfig) -> ServiceResult<()> {
    let filter = env_filter(logging);

    let result = if logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    result.map_err(|e| ServiceError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_error() {
        let logging = LoggingConfig {
            level: "warn".into(),
            json: true,
        };
        let _ = init_tracing(&logging);
        assert!(matches!(init_tracing(&logging), Err(ServiceError::Telemetry(_))));
    }
}
