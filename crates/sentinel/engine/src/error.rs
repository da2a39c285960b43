use thiserror::Error;

/// Errors raised inside the engine.
///
/// None of these cross the public `detect`/`retrain` surface: the engine
/// logs them, counts them in its diagnostics and degrades to an empty result.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    #[error("batch has no numeric features")]
    NoNumericFeatures,

    #[error("insufficient data for {stage}: {rows} rows, need at least {required}")]
    InsufficientData {
        stage: &'static str,
        rows: usize,
        required: usize,
    },

    #[error("dimension mismatch in {strategy}: trained on {expected} features, got {actual}")]
    DimensionMismatch {
        strategy: String,
        expected: usize,
        actual: usize,
    },

    #[error("feature transform failed: {0}")]
    Transform(String),

    #[error("strategy {strategy} failed: {reason}")]
    Strategy { strategy: String, reason: String },

    #[error("strategy not trained: {0}")]
    NotTrained(String),

    #[error("training failed: {0}")]
    TrainingFailed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Short stage label used in diagnostic events.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::MalformedBatch(_) | Self::NoNumericFeatures => "extract",
            Self::Transform(_) => "transform",
            Self::InsufficientData { stage, .. } => stage,
            Self::DimensionMismatch { .. } | Self::Strategy { .. } | Self::NotTrained(_) => {
                "strategy"
            }
            Self::TrainingFailed(_) => "train",
            Self::Serialization(_) => "synthesize",
            Self::InvalidConfig(_) => "config",
        }
    }
}

/// Convenience type alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
