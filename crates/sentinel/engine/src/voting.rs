//! Majority voting across the active strategies and the statistical detector.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use sentinel_types::{Classification, Consensus, Verdict, STATISTICAL_VOTER};

/// Everything one trained strategy said about a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutput {
    pub name: String,
    pub classifications: Vec<Classification>,
    pub scores: Vec<f64>,
}

impl StrategyOutput {
    /// The strategy's verdict on row `index`, if it produced one.
    pub fn verdict(&self, index: usize) -> Option<Verdict> {
        let classification = *self.classifications.get(index)?;
        let score = *self.scores.get(index)?;
        Some(Verdict {
            strategy: self.name.clone(),
            classification,
            score,
        })
    }
}

/// Combines per-voter verdicts into one [`Consensus`] per row.
#[derive(Debug, Clone)]
pub struct EnsembleVoter {
    /// Minimum vote ratio for an anomalous decision (inclusive).
    pub vote_threshold: f64,
    /// Confidence reported when no voter contributed a score.
    pub default_confidence: f64,
}

impl Default for EnsembleVoter {
    fn default() -> Self {
        Self {
            vote_threshold: 0.5,
            default_confidence: 0.5,
        }
    }
}

impl EnsembleVoter {
    pub fn new(vote_threshold: f64, default_confidence: f64) -> Self {
        Self {
            vote_threshold,
            default_confidence,
        }
    }

    /// One consensus per row, in row order.
    ///
    /// The statistical detector is always a voter; each strategy votes on
    /// the rows it produced output for.
    pub fn vote(
        &self,
        outputs: &[StrategyOutput],
        flagged: &BTreeSet<usize>,
        rows: usize,
    ) -> Vec<Consensus> {
        (0..rows)
            .map(|i| self.consensus(i, outputs, flagged.contains(&i)))
            .collect()
    }

    fn consensus(&self, index: usize, outputs: &[StrategyOutput], statistical: bool) -> Consensus {
        let mut votes = 0usize;
        let mut total = 0usize;
        let mut pool: Vec<f64> = Vec::new();
        let mut voted_by = Vec::new();

        for verdict in outputs.iter().filter_map(|o| o.verdict(index)) {
            total += 1;
            if verdict.is_anomaly() {
                votes += 1;
                voted_by.push(verdict.strategy.clone());
            }
            if verdict.score.is_finite() {
                pool.push(verdict.score.abs().min(1.0));
            }
        }

        total += 1;
        if statistical {
            votes += 1;
            pool.push(1.0);
            voted_by.push(STATISTICAL_VOTER.to_string());
        }

        let vote_ratio = votes as f64 / total as f64;
        let confidence = if pool.is_empty() {
            self.default_confidence
        } else {
            pool.iter().sum::<f64>() / pool.len() as f64
        };

        Consensus {
            index,
            votes,
            total_voters: total,
            vote_ratio,
            confidence,
            is_anomaly: vote_ratio >= self.vote_threshold,
            voted_by,
        }
    }
}
