//! Feature extraction and preparation.
//!
//! ```text
//!   [MetricSample] ──extract──► FeatureTable ──prepare──► FeatureMatrix
//!                                                  ▲
//!                                        FeatureTransform (per generation)
//! ```

pub mod preparer;
pub mod table;
pub mod transform;

pub use preparer::{FeaturePreparer, PreparedFeatures};
pub use table::{Column, ColumnData, FeatureExtractor, FeatureTable, MetricFeatureExtractor};
pub use transform::{FeatureMatrix, FeatureTransform, PrincipalComponents, StandardScaler};
