//! Engine configuration.
//!
//! Every field has a serde default so partial documents (and environment
//! overrides layered on top by the host) deserialize cleanly.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::strategy::StrategyKind;

/// Configuration for the ensemble engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Expected fraction of anomalies in training data; sets each learned
    /// strategy's cut-off percentile.
    pub contamination: f64,

    /// Decision threshold copied onto every anomaly record for audit.
    pub threshold: f64,

    /// Number of recent samples kept for retraining.
    pub window_size: usize,

    /// Minimum vote ratio for a sample to be anomalous (inclusive).
    pub vote_threshold: f64,

    /// Confidence used when no voter contributed a score.
    pub default_confidence: f64,

    /// |z| above which the statistical voter flags a row.
    pub z_score_threshold: f64,

    /// Reduce dimensionality when the scaled matrix is wider than this.
    pub reduction_min_columns: usize,

    /// Fraction of variance the reducer must retain.
    pub variance_retained: f64,

    /// Learned strategies taking part in the vote.
    pub strategies: Vec<StrategyKind>,

    pub isolation_forest: IsolationForestConfig,

    pub autoencoder: AutoencoderConfig,

    pub local_outlier_factor: LocalOutlierFactorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            threshold: 0.8,
            window_size: 100,
            vote_threshold: 0.5,
            default_confidence: 0.5,
            z_score_threshold: 3.0,
            reduction_min_columns: 10,
            variance_retained: 0.95,
            strategies: StrategyKind::all().to_vec(),
            isolation_forest: IsolationForestConfig::default(),
            autoencoder: AutoencoderConfig::default(),
            local_outlier_factor: LocalOutlierFactorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration with no learned strategies; only the statistical voter runs.
    pub fn statistical_only() -> Self {
        Self {
            strategies: Vec::new(),
            ..Self::default()
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(EngineError::InvalidConfig(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        for (name, value) in [
            ("threshold", self.threshold),
            ("vote_threshold", self.vote_threshold),
            ("default_confidence", self.default_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidConfig(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if !(self.variance_retained > 0.0 && self.variance_retained <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "variance_retained must be in (0, 1], got {}",
                self.variance_retained
            )));
        }
        if self.z_score_threshold <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "z_score_threshold must be positive".into(),
            ));
        }
        if self.window_size == 0 {
            return Err(EngineError::InvalidConfig("window_size must be non-zero".into()));
        }
        if self.isolation_forest.n_trees == 0 || self.isolation_forest.max_samples < 2 {
            return Err(EngineError::InvalidConfig(
                "isolation_forest needs at least one tree and max_samples >= 2".into(),
            ));
        }
        if self.autoencoder.epochs == 0 || self.autoencoder.learning_rate <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "autoencoder needs epochs > 0 and a positive learning_rate".into(),
            ));
        }
        if self.local_outlier_factor.n_neighbors == 0 {
            return Err(EngineError::InvalidConfig(
                "local_outlier_factor.n_neighbors must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Isolation forest parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationForestConfig {
    pub n_trees: usize,
    /// Sub-sample size per tree (capped at the training row count).
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

/// Reconstruction-error network parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoencoderConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            learning_rate: 0.01,
            seed: 42,
        }
    }
}

/// Local outlier factor parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalOutlierFactorConfig {
    pub n_neighbors: usize,
}

impl Default for LocalOutlierFactorConfig {
    fn default() -> Self {
        Self { n_neighbors: 20 }
    }
}
