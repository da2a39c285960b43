//! # sentinel-engine
//!
//! Ensemble anomaly detection over batches of infrastructure metrics.
//! Several learned strategies and a batch-local z-score detector vote on
//! every sample; samples a majority flags become structured anomaly records.
//!
//! ## Architecture
//!
//! ```text
//!   [MetricSample]
//!        │ FeatureExtractor
//!        ▼
//!   FeatureTable ──────────────────────────┐
//!        │ FeatureTransform (generation)   │
//!        ▼                                 ▼
//!   FeatureMatrix                 StatisticalOutlierDetector
//!        │ isolation forest,               │
//!        │ autoencoder, LOF                │
//!        ▼                                 ▼
//!   StrategyOutput × N ──► EnsembleVoter ◄─┘
//!                              │ Consensus
//!                              ▼
//!                      ResultSynthesizer ──► [AnomalyResult]
//! ```
//!
//! Fitted parameters live in an immutable `ModelGeneration` swapped
//! atomically on retrain, so a batch always sees one consistent generation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sentinel_engine::{EngineConfig, EnsembleEngine};
//! use sentinel_types::MetricSample;
//!
//! # async fn run() -> Result<(), sentinel_engine::EngineError> {
//! let engine = EnsembleEngine::new(EngineConfig::default())?;
//! let batch = vec![
//!     MetricSample::new("container_cpu_usage", 0.42).with_label("service", "checkout"),
//!     MetricSample::new("container_cpu_usage", 0.44).with_label("service", "checkout"),
//! ];
//! for anomaly in engine.detect(&batch).await {
//!     println!("{} {} {}", anomaly.id, anomaly.severity, anomaly.description);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod features;
pub mod lifecycle;
pub mod statistical;
pub mod strategy;
pub mod synthesis;
pub mod voting;
pub mod window;

mod stats;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use config::{AutoencoderConfig, EngineConfig, IsolationForestConfig, LocalOutlierFactorConfig};
pub use diagnostics::{DiagnosticsSnapshot, EngineDiagnostics, LastError};
pub use engine::EnsembleEngine;
pub use error::{EngineError, EngineResult};
pub use features::{
    ColumnData, FeatureExtractor, FeatureMatrix, FeaturePreparer, FeatureTable, FeatureTransform,
    MetricFeatureExtractor, PreparedFeatures,
};
pub use lifecycle::{LifecycleState, ModelGeneration, RetrainOutcome, TrainingLifecycle};
pub use statistical::StatisticalOutlierDetector;
pub use strategy::{DetectionStrategy, StrategyKind, StrategySlot, StrategyState};
pub use synthesis::{fingerprint, BatchContext, ResultSynthesizer};
pub use voting::{EnsembleVoter, StrategyOutput};
pub use window::{RecentWindow, RingBuffer, TrainingDataSource};
