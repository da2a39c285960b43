//! Fitted feature transforms: column alignment, standard scaling and a
//! variance-retaining principal component projection.

use std::collections::BTreeSet;

use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::stats;

use super::table::FeatureTable;

// ── Matrix ──────────────────────────────────────────────────────────────

/// Dense, row-major numeric matrix handed to the strategies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    width: usize,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Build from rows. Every row must have the same width.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> EngineResult<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(EngineError::Transform(format!(
                "ragged matrix: expected width {}, found row of width {}",
                width,
                bad.len()
            )));
        }
        Ok(Self { width, rows })
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.rows[index]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Values of column `index`.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[index]).collect()
    }

    fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.nrows(), self.width, |i, j| self.rows[i][j])
    }
}

// ── Scaler ──────────────────────────────────────────────────────────────

/// Per-column standardisation to zero mean and unit variance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(matrix: &FeatureMatrix) -> EngineResult<Self> {
        if matrix.is_empty() {
            return Err(EngineError::InsufficientData {
                stage: "scaler",
                rows: 0,
                required: 1,
            });
        }
        let mut means = Vec::with_capacity(matrix.width());
        let mut scales = Vec::with_capacity(matrix.width());
        for j in 0..matrix.width() {
            let column = matrix.column(j);
            means.push(stats::mean(&column));
            let sd = stats::std_dev(&column, 0);
            scales.push(if sd < f64::EPSILON { 1.0 } else { sd });
        }
        Ok(Self { means, scales })
    }

    pub fn transform(&self, matrix: &FeatureMatrix) -> EngineResult<FeatureMatrix> {
        if matrix.width() != self.means.len() {
            return Err(EngineError::Transform(format!(
                "scaler fitted on {} columns, got {}",
                self.means.len(),
                matrix.width()
            )));
        }
        let rows = matrix
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(x, (m, s))| (x - m) / s)
                    .collect()
            })
            .collect();
        FeatureMatrix::from_rows(rows)
    }
}

// ── Principal components ────────────────────────────────────────────────

/// Projection onto the leading principal components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrincipalComponents {
    pub means: Vec<f64>,
    /// One component per entry, each of the input width.
    pub components: Vec<Vec<f64>>,
    pub explained_variance_ratio: Vec<f64>,
}

impl PrincipalComponents {
    /// Fit on `matrix`, keeping the fewest components whose cumulative
    /// explained variance ratio exceeds `variance_retained`.
    pub fn fit(matrix: &FeatureMatrix, variance_retained: f64) -> EngineResult<Self> {
        let n = matrix.nrows();
        let d = matrix.width();
        if n < 2 {
            return Err(EngineError::InsufficientData {
                stage: "reducer",
                rows: n,
                required: 2,
            });
        }

        let means: Vec<f64> = (0..d).map(|j| stats::mean(&matrix.column(j))).collect();
        let mut centered = matrix.to_dmatrix();
        for (j, m) in means.iter().enumerate() {
            for i in 0..n {
                centered[(i, j)] -= m;
            }
        }
        let covariance = (centered.transpose() * &centered) / (n - 1) as f64;
        let eigen = SymmetricEigen::new(covariance);

        let mut order: Vec<usize> = (0..d).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let variances: Vec<f64> = order
            .iter()
            .map(|&i| eigen.eigenvalues[i].max(0.0))
            .collect();
        let total: f64 = variances.iter().sum();
        if !total.is_finite() {
            return Err(EngineError::Transform("non-finite covariance".into()));
        }
        let ratios: Vec<f64> = if total < f64::EPSILON {
            let mut r = vec![0.0; d];
            r[0] = 1.0;
            r
        } else {
            variances.iter().map(|v| v / total).collect()
        };

        let mut cumulative = 0.0;
        let mut within = 0;
        for r in &ratios {
            cumulative += r;
            if cumulative <= variance_retained {
                within += 1;
            }
        }
        let keep = (within + 1).min(d);

        let components = order[..keep]
            .iter()
            .map(|&c| eigen.eigenvectors.column(c).iter().copied().collect())
            .collect();

        Ok(Self {
            means,
            components,
            explained_variance_ratio: ratios[..keep].to_vec(),
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    pub fn transform(&self, matrix: &FeatureMatrix) -> EngineResult<FeatureMatrix> {
        if matrix.width() != self.means.len() {
            return Err(EngineError::Transform(format!(
                "reducer fitted on {} columns, got {}",
                self.means.len(),
                matrix.width()
            )));
        }
        let rows = matrix
            .rows()
            .iter()
            .map(|row| {
                self.components
                    .iter()
                    .map(|component| {
                        row.iter()
                            .zip(&self.means)
                            .zip(component)
                            .map(|((x, m), c)| (x - m) * c)
                            .sum()
                    })
                    .collect()
            })
            .collect();
        FeatureMatrix::from_rows(rows)
    }
}

// ── Fitted transform ────────────────────────────────────────────────────

/// The immutable fitted parameters of one model generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureTransform {
    /// Numeric column names the transform was fitted on, in order.
    pub columns: Vec<String>,
    pub scaler: StandardScaler,
    pub reducer: Option<PrincipalComponents>,
}

impl FeatureTransform {
    /// Width of the matrices this transform produces.
    pub fn output_width(&self) -> usize {
        match &self.reducer {
            Some(reducer) => reducer.n_components(),
            None => self.columns.len(),
        }
    }

    /// Align, impute, scale and reduce `table` with the fitted parameters.
    ///
    /// The table must carry exactly the fitted numeric columns, in any
    /// order. Anything else is a [`EngineError::Transform`].
    pub fn apply(&self, table: &FeatureTable) -> EngineResult<FeatureMatrix> {
        self.check_columns(table)?;
        let raw = align(table, &self.columns)?;
        let scaled = self.scaler.transform(&raw)?;
        let out = match &self.reducer {
            Some(reducer) => reducer.transform(&scaled)?,
            None => scaled,
        };
        if out.rows().iter().flatten().any(|v| !v.is_finite()) {
            return Err(EngineError::Transform("non-finite value after transform".into()));
        }
        Ok(out)
    }

    fn check_columns(&self, table: &FeatureTable) -> EngineResult<()> {
        let fitted: BTreeSet<&str> = self.columns.iter().map(String::as_str).collect();
        let seen: BTreeSet<&str> = table.numeric_columns().map(|(name, _)| name).collect();
        if fitted == seen {
            return Ok(());
        }
        let unseen: Vec<&str> = seen.difference(&fitted).copied().collect();
        let missing: Vec<&str> = fitted.difference(&seen).copied().collect();
        Err(EngineError::Transform(format!(
            "feature columns differ from fitted set (unseen: {:?}, missing: {:?})",
            unseen, missing
        )))
    }
}

/// Numeric cells of `table` laid out in `columns` order, zero-imputed.
/// Columns the table lacks are all zero; extra table columns are ignored.
pub(crate) fn align(table: &FeatureTable, columns: &[String]) -> EngineResult<FeatureMatrix> {
    let sources: Vec<Option<&[Option<f64>]>> =
        columns.iter().map(|c| table.numeric_column(c)).collect();
    let rows = (0..table.row_count())
        .map(|i| {
            sources
                .iter()
                .map(|cells| {
                    cells
                        .and_then(|cells| cells.get(i).copied().flatten())
                        .filter(|v| v.is_finite())
                        .unwrap_or(0.0)
                })
                .collect()
        })
        .collect();
    FeatureMatrix::from_rows(rows)
}
