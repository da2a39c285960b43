use sentinel_engine::EngineError;
use thiserror::Error;

/// Errors raised by the service host.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid metric batch: {0}")]
    Json(#[from] serde_json::Error),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("tracing setup failed: {0}")]
    Telemetry(String),
}

/// Convenience type alias for service results.
pub type ServiceResult<T> = Result<T, ServiceError>;
