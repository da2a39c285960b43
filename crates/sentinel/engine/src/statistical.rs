//! Batch-local z-score detector. Needs no training and always votes.

use std::collections::BTreeSet;

use tracing::trace;

use crate::features::FeatureTable;
use crate::stats;

/// Flags rows whose value in any numeric column lies more than
/// `z_threshold` sample standard deviations from that column's batch mean.
#[derive(Debug, Clone)]
pub struct StatisticalOutlierDetector {
    /// Z-score threshold (default: 3.0).
    pub z_threshold: f64,
}

impl StatisticalOutlierDetector {
    pub fn new(z_threshold: f64) -> Self {
        Self { z_threshold }
    }

    /// Row indices flagged in `table`. Missing cells neither contribute to
    /// the column statistics nor get flagged.
    pub fn flag(&self, table: &FeatureTable) -> BTreeSet<usize> {
        let mut flagged = BTreeSet::new();
        for (name, cells) in table.numeric_columns() {
            let present: Vec<(usize, f64)> = cells
                .iter()
                .copied()
                .enumerate()
                .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
                .collect();
            if present.len() < 2 {
                continue;
            }

            let values: Vec<f64> = present.iter().map(|&(_, v)| v).collect();
            let std_dev = stats::std_dev(&values, 1);
            if std_dev <= 0.0 {
                continue;
            }
            let mean = stats::mean(&values);

            for (i, v) in present {
                let z = (v - mean).abs() / std_dev;
                if z > self.z_threshold {
                    trace!(column = name, row = i, z, "Row exceeds z-score threshold");
                    flagged.insert(i);
                }
            }
        }
        flagged
    }
}

impl Default for StatisticalOutlierDetector {
    fn default() -> Self {
        Self::new(3.0)
    }
}
