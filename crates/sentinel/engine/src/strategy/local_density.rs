//! Local outlier factor in novelty mode.
//!
//! Training rows form the reference set. A new row's LOF is the mean local
//! reachability density of its `k` nearest reference rows divided by its own.

use tracing::debug;

use sentinel_types::Classification;

use super::{check_width, label_by_cutoff, DetectionStrategy};
use crate::config::LocalOutlierFactorConfig;
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureMatrix;
use crate::stats;

const NAME: &str = "lof";

const DENSITY_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone)]
struct Reference {
    rows: Vec<Vec<f64>>,
    k: usize,
    /// Distance from each reference row to its k-th nearest neighbour.
    k_distance: Vec<f64>,
    /// Local reachability density of each reference row.
    lrd: Vec<f64>,
    cutoff: f64,
}

impl Reference {
    /// Indices and distances of the `k` nearest reference rows to `point`,
    /// optionally excluding reference row `skip`.
    fn neighbours(&self, point: &[f64], skip: Option<usize>) -> Vec<(usize, f64)> {
        nearest(&self.rows, point, self.k, skip)
    }

    fn lrd_of(&self, neighbours: &[(usize, f64)]) -> f64 {
        let reach: f64 = neighbours
            .iter()
            .map(|&(j, d)| d.max(self.k_distance[j]))
            .sum::<f64>()
            / neighbours.len() as f64;
        1.0 / (reach + DENSITY_EPSILON)
    }

    fn lof_of(&self, point: &[f64], skip: Option<usize>) -> f64 {
        let neighbours = self.neighbours(point, skip);
        let own = self.lrd_of(&neighbours);
        let mean_neighbour =
            neighbours.iter().map(|&(j, _)| self.lrd[j]).sum::<f64>() / neighbours.len() as f64;
        mean_neighbour / own
    }
}

fn nearest(rows: &[Vec<f64>], point: &[f64], k: usize, skip: Option<usize>) -> Vec<(usize, f64)> {
    let mut distances: Vec<(usize, f64)> = rows
        .iter()
        .enumerate()
        .filter(|(j, _)| Some(*j) != skip)
        .map(|(j, r)| (j, stats::euclidean(point, r)))
        .collect();
    distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    distances.truncate(k);
    distances
}

/// Local outlier factor strategy.
#[derive(Debug, Clone)]
pub struct LocalOutlierFactor {
    config: LocalOutlierFactorConfig,
    contamination: f64,
    width: usize,
    reference: Option<Reference>,
}

impl LocalOutlierFactor {
    pub fn new(config: LocalOutlierFactorConfig, contamination: f64, width: usize) -> Self {
        Self {
            config,
            contamination,
            width,
            reference: None,
        }
    }

    fn reference(&self) -> EngineResult<&Reference> {
        self.reference
            .as_ref()
            .ok_or_else(|| EngineError::NotTrained(NAME.into()))
    }

    /// Raw LOF values; about 1 for inliers, larger for outliers.
    pub fn factors(&self, matrix: &FeatureMatrix) -> EngineResult<Vec<f64>> {
        let reference = self.reference()?;
        check_width(NAME, self.width, matrix)?;
        Ok(matrix
            .rows()
            .iter()
            .map(|r| reference.lof_of(r, None))
            .collect())
    }
}

impl DetectionStrategy for LocalOutlierFactor {
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

        let k = self.config.n_neighbors.clamp(1, n - 1);
        let rows = matrix.rows().to_vec();
        let neighbourhoods: Vec<Vec<(usize, f64)>> = (0..n)
            .map(|i| nearest(&rows, &rows[i], k, Some(i)))
            .collect();
        let k_distance: Vec<f64> = neighbourhoods
            .iter()
            .map(|hood| hood.last().map(|&(_, d)| d).unwrap_or(0.0))
            .collect();

        let mut reference = Reference {
            rows,
            k,
            k_distance,
            lrd: Vec::new(),
            cutoff: 0.0,
        };
        reference.lrd = neighbourhoods.iter().map(|h| reference.lrd_of(h)).collect();

        let training: Vec<f64> = (0..n)
            .map(|i| reference.lof_of(&reference.rows[i], Some(i)))
            .collect();
        reference.cutoff = stats::percentile(&training, 100.0 * (1.0 - self.contamination));

        debug!(k, rows = n, cutoff = reference.cutoff, "Local outlier factor fitted");
        self.reference = Some(reference);
        Ok(())
    }

    fn classify(&self, matrix: &FeatureMatrix) -> EngineResult<Vec<Classification>> {
        let cutoff = self.reference()?.cutoff;
        Ok(label_by_cutoff(&self.factors(matrix)?, cutoff))
    }

    fn score(&self, matrix: &FeatureMatrix) -> EngineResult<Vec<f64>> {
        let cutoff = self.reference()?.cutoff;
        Ok(self
            .factors(matrix)?
            .into_iter()
            .map(|f| stats::relative_to_cutoff(f, cutoff))
            .collect())
    }

    fn input_width(&self) -> usize {
        self.width
    }
}
