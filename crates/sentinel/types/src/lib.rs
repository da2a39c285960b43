//! # sentinel-types
//!
//! Shared data model for the Sentinel ensemble anomaly detector.
//!
//! ```text
//!   MetricSample ──► (engine) ──► Verdict × N ──► Consensus ──► AnomalyResult
//! ```
//!
//! Everything here is plain data plus a few pure helpers (anomaly type
//! classification and severity scoring) that downstream alerting code can
//! reuse without pulling in the engine.

#![deny(unsafe_code)]

pub mod anomaly;
pub mod health;
pub mod metric;
pub mod verdict;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use anomaly::{AnomalyId, AnomalyMetadata, AnomalyResult, AnomalySeverity, AnomalyType};
pub use health::HealthStatus;
pub use metric::MetricSample;
pub use verdict::{Classification, Consensus, Verdict};

/// Name under which the statistical z-score voter is reported.
pub const STATISTICAL_VOTER: &str = "statistical";
