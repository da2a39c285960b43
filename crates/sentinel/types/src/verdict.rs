//! Per-strategy verdicts and the per-sample consensus built from them.

use serde::{Deserialize, Serialize};

/// Outcome of a single strategy for a single sample.
///
/// Mirrors the conventional `{-1, +1}` outlier labelling: `-1` is anomalous.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum Classification {
    Anomalous = -1,
    Normal = 1,
}

impl Classification {
    pub fn is_anomalous(self) -> bool {
        matches!(self, Self::Anomalous)
    }

    /// The signed label (`-1` or `+1`).
    pub fn as_label(self) -> i8 {
        self as i8
    }
}

/// One strategy's opinion about one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Strategy name (provenance).
    pub strategy: String,
    pub classification: Classification,
    /// Anomaly strength; larger magnitude means more anomalous.
    pub score: f64,
}

impl Verdict {
    pub fn is_anomaly(&self) -> bool {
        self.classification.is_anomalous()
    }
}

/// Aggregate decision for one sample of a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    /// Row index into the originating batch.
    pub index: usize,
    /// Voters that classified the sample as anomalous.
    pub votes: usize,
    /// Voters eligible for this sample (active strategies + statistical).
    pub total_voters: usize,
    /// `votes / total_voters`, in `[0, 1]`.
    pub vote_ratio: f64,
    /// Mean pooled score magnitude, in `[0, 1]`.
    pub confidence: f64,
    /// Final decision.
    pub is_anomaly: bool,
    /// Names of the voters that flagged the sample.
    pub voted_by: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_labels() {
        assert_eq!(Classification::Anomalous.as_label(), -1);
        assert_eq!(Classification::Normal.as_label(), 1);
        assert!(Classification::Anomalous.is_anomalous());
        assert!(!Classification::Normal.is_anomalous());
    }

    #[test]
    fn verdict_reports_anomaly() {
        let v = Verdict {
            strategy: "lof".into(),
            classification: Classification::Anomalous,
            score: 0.8,
        };
        assert!(v.is_anomaly());
    }
}
