//! Learned detection strategies behind a fixed train/classify/score contract.
//!
//! Provides:
//! - `DetectionStrategy` trait
//! - 3 built-in strategies: isolation forest, reconstruction error
//!   (autoencoder), local outlier factor
//! - `StrategyKind` roster entries and the per-strategy `StrategyState` tag

pub mod isolation;
pub mod local_density;
pub mod reconstruction;

use serde::{Deserialize, Serialize};

use sentinel_types::Classification;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureMatrix;

pub use isolation::IsolationForest;
pub use local_density::LocalOutlierFactor;
pub use reconstruction::Autoencoder;

// ── Trait ────────────────────────────────────────────────────────────────

/// Pluggable learned anomaly classifier.
///
/// `classify` and `score` return one entry per matrix row, in row order.
/// Scores lie in `[0, 1]`; larger means more anomalous.
pub trait DetectionStrategy: Send + Sync + std::fmt::Debug {
    /// Name of the strategy (for provenance tracking).
    fn name(&self) -> &str;

    /// Fit from scratch on `matrix`, discarding any previous state.
    fn train(&mut self, matrix: &FeatureMatrix) -> EngineResult<()>;

    fn classify(&self, matrix: &FeatureMatrix) -> EngineResult<Vec<Classification>>;

    fn score(&self, matrix: &FeatureMatrix) -> EngineResult<Vec<f64>>;

    /// Feature width this instance was built for.
    fn input_width(&self) -> usize;
}

/// Reject matrices whose width differs from the strategy's.
pub(crate) fn check_width(
    strategy: &str,
    expected: usize,
    matrix: &FeatureMatrix,
) -> EngineResult<()> {
    if matrix.width() != expected {
        return Err(EngineError::DimensionMismatch {
            strategy: strategy.to_string(),
            expected,
            actual: matrix.width(),
        });
    }
    Ok(())
}

/// Label each score against a cut-off: strictly above is anomalous.
pub(crate) fn label_by_cutoff(scores: &[f64], cutoff: f64) -> Vec<Classification> {
    scores
        .iter()
        .map(|s| {
            if *s > cutoff {
                Classification::Anomalous
            } else {
                Classification::Normal
            }
        })
        .collect()
}

// ── Roster ──────────────────────────────────────────────────────────────

/// A learned strategy that can be enabled in the roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "isolation_forest")]
    IsolationForest,
    #[serde(rename = "autoencoder")]
    Autoencoder,
    #[serde(rename = "lof")]
    LocalOutlierFactor,
}

impl StrategyKind {
    pub fn all() -> &'static [StrategyKind] {
        &[
            StrategyKind::IsolationForest,
            StrategyKind::Autoencoder,
            StrategyKind::LocalOutlierFactor,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IsolationForest => "isolation_forest",
            Self::Autoencoder => "autoencoder",
            Self::LocalOutlierFactor => "lof",
        }
    }

    /// Fresh, untrained instance sized for `width` input features.
    pub fn build(self, config: &EngineConfig, width: usize) -> Box<dyn DetectionStrategy> {
        match self {
            Self::IsolationForest => Box::new(IsolationForest::new(
                config.isolation_forest.clone(),
                config.contamination,
                width,
            )),
            Self::Autoencoder => Box::new(Autoencoder::new(
                config.autoencoder.clone(),
                config.contamination,
                width,
            )),
            Self::LocalOutlierFactor => Box::new(LocalOutlierFactor::new(
                config.local_outlier_factor.clone(),
                config.contamination,
                width,
            )),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a roster entry can vote.
#[derive(Debug)]
pub enum StrategyState {
    Uninitialized,
    Trained(Box<dyn DetectionStrategy>),
}

/// One roster entry inside a model generation.
#[derive(Debug)]
pub struct StrategySlot {
    pub kind: StrategyKind,
    pub state: StrategyState,
}

impl StrategySlot {
    pub fn is_trained(&self) -> bool {
        matches!(self.state, StrategyState::Trained(_))
    }

    /// The trained strategy, if any.
    pub fn trained(&self) -> Option<&dyn DetectionStrategy> {
        match &self.state {
            StrategyState::Trained(strategy) => Some(strategy.as_ref()),
            StrategyState::Uninitialized => None,
        }
    }
}
