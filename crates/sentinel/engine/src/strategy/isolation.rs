//! Isolation forest.
//!
//! Anomalies are few and different, so random axis-aligned splits isolate
//! them in fewer steps. The score of a row is `2^(-E[h(x)] / c(ψ))` where
//! `h` is its path length in a tree and `c(ψ)` the expected path length of
//! an unsuccessful BST search over the sub-sample size `ψ`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use sentinel_types::Classification;

use super::{check_width, label_by_cutoff, DetectionStrategy};
use crate::config::IsolationForestConfig;
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureMatrix;
use crate::stats;

const NAME: &str = "isolation_forest";

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Expected path length of an unsuccessful search in a BST of `n` nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum IsolationNode {
    Internal {
        feature: usize,
        split: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    Leaf {
        size: usize,
    },
}

impl IsolationNode {
    fn build(
        rows: &[&[f64]],
        width: usize,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Self {
        if depth >= max_depth || rows.len() <= 1 {
            return Self::Leaf { size: rows.len() };
        }

        let feature = rng.gen_range(0..width);
        let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r[feature]), hi.max(r[feature]))
        });
        if max - min < f64::EPSILON {
            return Self::Leaf { size: rows.len() };
        }

        let split = rng.gen_range(min..max);
        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
            rows.iter().copied().partition(|r| r[feature] < split);

        Self::Internal {
            feature,
            split,
            left: Box::new(Self::build(&left, width, depth + 1, max_depth, rng)),
            right: Box::new(Self::build(&right, width, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, row: &[f64], depth: usize) -> f64 {
        match self {
            Self::Leaf { size } => depth as f64 + average_path_length(*size),
            Self::Internal {
                feature,
                split,
                left,
                right,
            } => {
                if row[*feature] < *split {
                    left.path_length(row, depth + 1)
                } else {
                    right.path_length(row, depth + 1)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Forest {
    trees: Vec<IsolationNode>,
    sample_size: usize,
    cutoff: f64,
}

impl Forest {
    fn score_row(&self, row: &[f64]) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(row, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / average_path_length(self.sample_size))
    }
}

/// Isolation forest strategy.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    config: IsolationForestConfig,
    contamination: f64,
    width: usize,
    forest: Option<Forest>,
}

impl IsolationForest {
    pub fn new(config: IsolationForestConfig, contamination: f64, width: usize) -> Self {
        Self {
            config,
            contamination,
            width,
            forest: None,
        }
    }

    fn forest(&self) -> EngineResult<&Forest> {
        self.forest
            .as_ref()
            .ok_or_else(|| EngineError::NotTrained(NAME.into()))
    }

    /// Decision cut-off learned from the training scores.
    pub fn cutoff(&self) -> Option<f64> {
        self.forest.as_ref().map(|f| f.cutoff)
    }
}

impl DetectionStrategy for IsolationForest {
    fn name(&self) -> &str {
        NAME
    }

    fn train(&mut self, matrix: &FeatureMatrix) -> EngineResult<()> {
        check_width(NAME, self.width, matrix)?;
        let n = matrix.nrows();
        if n < 2 {
            return Err(EngineError::InsufficientData {
                stage: NAME,
                rows: n,
                required: 2,
            });
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let sample_size = self.config.max_samples.min(n);
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..self.config.n_trees)
            .map(|_| {
                let picked: Vec<&[f64]> = rand::seq::index::sample(&mut rng, n, sample_size)
                    .iter()
                    .map(|i| matrix.row(i))
                    .collect();
                IsolationNode::build(&picked, self.width, 0, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Forest {
            trees,
            sample_size,
            cutoff: 0.0,
        };
        let training_scores: Vec<f64> = matrix.rows().iter().map(|r| forest.score_row(r)).collect();
        forest.cutoff = stats::percentile(&training_scores, 100.0 * (1.0 - self.contamination));

        debug!(
            trees = forest.trees.len(),
            sample_size,
            cutoff = forest.cutoff,
            "Isolation forest trained"
        );
        self.forest = Some(forest);
        Ok(())
    }

    fn classify(&self, matrix: &FeatureMatrix) -> EngineResult<Vec<Classification>> {
        let cutoff = self.forest()?.cutoff;
        Ok(label_by_cutoff(&self.score(matrix)?, cutoff))
    }

    fn score(&self, matrix: &FeatureMatrix) -> EngineResult<Vec<f64>> {
        let forest = self.forest()?;
        check_width(NAME, self.width, matrix)?;
        Ok(matrix.rows().iter().map(|r| forest.score_row(r)).collect())
    }

    fn input_width(&self) -> usize {
        self.width
    }
}
