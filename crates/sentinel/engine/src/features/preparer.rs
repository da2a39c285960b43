//! Fit-once / reuse feature preparation.

use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

use super::table::FeatureTable;
use super::transform::{align, FeatureMatrix, FeatureTransform, PrincipalComponents, StandardScaler};

/// Output of [`FeaturePreparer::prepare`].
#[derive(Clone, Debug)]
pub struct PreparedFeatures {
    pub matrix: FeatureMatrix,
    /// Set when `prepare` had to fit a new transform for this call.
    pub fitted: Option<FeatureTransform>,
}

/// Turns a feature table into a scaled (and possibly reduced) matrix.
///
/// Holds only configuration; fitted parameters live in a
/// [`FeatureTransform`] owned by the caller's model generation.
#[derive(Debug, Clone)]
pub struct FeaturePreparer {
    reduction_min_columns: usize,
    variance_retained: f64,
}

impl FeaturePreparer {
    pub fn new(reduction_min_columns: usize, variance_retained: f64) -> Self {
        Self {
            reduction_min_columns,
            variance_retained,
        }
    }

    /// Fit scaler then reducer on `table`.
    pub fn fit(&self, table: &FeatureTable) -> EngineResult<FeatureTransform> {
        let columns: Vec<String> = table
            .numeric_columns()
            .map(|(name, _)| name.to_string())
            .collect();
        if columns.is_empty() {
            return Err(EngineError::NoNumericFeatures);
        }

        let raw = align(table, &columns)?;
        let scaler = StandardScaler::fit(&raw)?;
        let scaled = scaler.transform(&raw)?;

        let reducer = if scaled.width() > self.reduction_min_columns {
            let pca = PrincipalComponents::fit(&scaled, self.variance_retained)?;
            debug!(
                input = scaled.width(),
                kept = pca.n_components(),
                "Fitted dimensionality reduction"
            );
            Some(pca)
        } else {
            None
        };

        Ok(FeatureTransform {
            columns,
            scaler,
            reducer,
        })
    }

    /// Prepare `table` for the strategies.
    ///
    /// Reuses `fitted` when given, otherwise fits on `table` and returns the
    /// new transform alongside the matrix. `None` means there is nothing to
    /// analyze: no numeric columns, or the transform failed (logged).
    pub fn prepare(
        &self,
        table: &FeatureTable,
        fitted: Option<&FeatureTransform>,
    ) -> Option<PreparedFeatures> {
        if !table.has_numeric_columns() {
            debug!("No numeric columns; nothing to prepare");
            return None;
        }
        match self.try_prepare(table, fitted) {
            Ok(prepared) => Some(prepared),
            Err(e) => {
                warn!(stage = e.stage(), error = %e, "Feature preparation failed");
                None
            }
        }
    }

    fn try_prepare(
        &self,
        table: &FeatureTable,
        fitted: Option<&FeatureTransform>,
    ) -> EngineResult<PreparedFeatures> {
        match fitted {
            Some(transform) => Ok(PreparedFeatures {
                matrix: transform.apply(table)?,
                fitted: None,
            }),
            None => {
                let transform = self.fit(table)?;
                let matrix = transform.apply(table)?;
                Ok(PreparedFeatures {
                    matrix,
                    fitted: Some(transform),
                })
            }
        }
    }
}
