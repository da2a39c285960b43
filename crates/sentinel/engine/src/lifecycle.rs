//! Model generations and the training state machine.
//!
//! ```text
//!   UNTRAINED ──first detect──► TRAINED ──retrain──► TRAINED (new generation)
//! ```
//!
//! A generation is immutable once published. Readers take one `Arc` per
//! batch; a retrain builds the next generation off to the side and swaps it
//! in atomically. Only one training pass runs at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::diagnostics::EngineDiagnostics;
use crate::error::{EngineError, EngineResult};
use crate::features::{FeaturePreparer, FeatureTable, FeatureTransform};
use crate::strategy::{DetectionStrategy, StrategyKind, StrategySlot, StrategyState};

// ── Generation ──────────────────────────────────────────────────────────

/// One fully fitted snapshot of transform and strategy parameters.
#[derive(Debug)]
pub struct ModelGeneration {
    pub id: u64,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub transform: FeatureTransform,
    pub strategies: Vec<StrategySlot>,
}

impl ModelGeneration {
    /// Strategies able to vote.
    pub fn active(&self) -> impl Iterator<Item = &dyn DetectionStrategy> {
        self.strategies.iter().filter_map(StrategySlot::trained)
    }

    pub fn trained_count(&self) -> usize {
        self.strategies.iter().filter(|s| s.is_trained()).count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Untrained,
    Trained,
}

/// Result of an explicit retrain request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrainOutcome {
    /// A new generation was published.
    Retrained {
        generation: u64,
        strategies_trained: usize,
    },
    /// No data to train on; nothing changed.
    Skipped,
    /// Another training pass was already running.
    Coalesced,
    /// Training failed; the previous generation (if any) stays live.
    Failed(String),
}

// ── Lifecycle ───────────────────────────────────────────────────────────

pub struct TrainingLifecycle {
    config: EngineConfig,
    preparer: FeaturePreparer,
    current: ArcSwapOption<ModelGeneration>,
    writer: Mutex<()>,
    next_generation: AtomicU64,
    diagnostics: Arc<EngineDiagnostics>,
}

impl TrainingLifecycle {
    pub fn new(config: EngineConfig, diagnostics: Arc<EngineDiagnostics>) -> Self {
        let preparer = FeaturePreparer::new(config.reduction_min_columns, config.variance_retained);
        Self {
            config,
            preparer,
            current: ArcSwapOption::from(None),
            writer: Mutex::new(()),
            next_generation: AtomicU64::new(0),
            diagnostics,
        }
    }

    /// The live generation, if any.
    pub fn current(&self) -> Option<Arc<ModelGeneration>> {
        self.current.load_full()
    }

    pub fn state(&self) -> LifecycleState {
        if self.current.load().is_some() {
            LifecycleState::Trained
        } else {
            LifecycleState::Untrained
        }
    }

    /// Configured roster.
    pub fn roster(&self) -> &[StrategyKind] {
        &self.config.strategies
    }

    /// Live generation, training one on `table` first if none exists.
    ///
    /// Concurrent callers wait for the single in-flight training pass.
    pub async fn ensure_trained(&self, table: &FeatureTable) -> EngineResult<Arc<ModelGeneration>> {
        if let Some(generation) = self.current.load_full() {
            return Ok(generation);
        }

        let _guard = self.writer.lock().await;
        if let Some(generation) = self.current.load_full() {
            return Ok(generation);
        }

        info!(rows = table.row_count(), "Training initial model generation");
        let generation = Arc::new(self.train(table)?);
        self.current.store(Some(Arc::clone(&generation)));
        Ok(generation)
    }

    /// Refit everything on `table` and publish a new generation.
    pub async fn retrain(&self, table: &FeatureTable) -> RetrainOutcome {
        if table.is_empty() || !table.has_numeric_columns() {
            info!(rows = table.row_count(), "No usable retraining data; skipping");
            return RetrainOutcome::Skipped;
        }

        let Ok(_guard) = self.writer.try_lock() else {
            debug!("Retrain already in flight; coalescing");
            self.diagnostics.retrain_coalesced();
            return RetrainOutcome::Coalesced;
        };

        match self.train(table) {
            Ok(generation) => {
                let outcome = RetrainOutcome::Retrained {
                    generation: generation.id,
                    strategies_trained: generation.trained_count(),
                };
                self.current.store(Some(Arc::new(generation)));
                outcome
            }
            Err(e) => {
                warn!(stage = e.stage(), error = %e, "Retrain failed; keeping previous generation");
                self.diagnostics.training_failed(&e);
                RetrainOutcome::Failed(e.to_string())
            }
        }
    }

    /// Scaler, then reducer, then each enabled strategy.
    fn train(&self, table: &FeatureTable) -> EngineResult<ModelGeneration> {
        let transform = self.preparer.fit(table)?;
        let matrix = transform.apply(table)?;

        let mut strategies = Vec::with_capacity(self.config.strategies.len());
        for &kind in &self.config.strategies {
            let mut strategy = kind.build(&self.config, matrix.width());
            let state = match strategy.train(&matrix) {
                Ok(()) => StrategyState::Trained(strategy),
                Err(e) => {
                    warn!(strategy = %kind, error = %e, "Strategy failed to train");
                    self.diagnostics.strategy_failed(&e);
                    StrategyState::Uninitialized
                }
            };
            strategies.push(StrategySlot { kind, state });
        }

        let trained = strategies.iter().filter(|s| s.is_trained()).count();
        if !strategies.is_empty() && trained == 0 {
            return Err(EngineError::TrainingFailed(format!(
                "none of {} strategies trained on {} rows",
                strategies.len(),
                matrix.nrows()
            )));
        }

        let id = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            generation = id,
            rows = matrix.nrows(),
            width = matrix.width(),
            strategies = trained,
            "Model generation trained"
        );

        Ok(ModelGeneration {
            id,
            trained_at: Utc::now(),
            training_rows: matrix.nrows(),
            transform,
            strategies,
        })
    }
}

impl std::fmt::Debug for TrainingLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingLifecycle")
            .field("state", &self.state())
            .field("roster", &self.config.strategies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ColumnData;

    fn table(values: &[f64]) -> FeatureTable {
        let mut t = FeatureTable::new(values.len());
        t.push_column(
            "cpu_usage",
            ColumnData::Numeric(values.iter().copied().map(Some).collect()),
        )
        .unwrap();
        t
    }

    fn lifecycle(config: EngineConfig) -> TrainingLifecycle {
        TrainingLifecycle::new(config, Arc::new(EngineDiagnostics::default()))
    }

    fn lof_only() -> EngineConfig {
        EngineConfig {
            strategies: vec![StrategyKind::LocalOutlierFactor],
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn first_use_trains_and_later_calls_reuse() {
        let lc = lifecycle(lof_only());
        assert_eq!(lc.state(), LifecycleState::Untrained);

        let g1 = lc.ensure_trained(&table(&[1.0, 2.0, 3.0, 4.0])).await.unwrap();
        assert_eq!(lc.state(), LifecycleState::Trained);
        assert_eq!(g1.id, 1);
        assert_eq!(g1.trained_count(), 1);

        let g2 = lc.ensure_trained(&table(&[100.0, 200.0])).await.unwrap();
        assert!(Arc::ptr_eq(&g1, &g2));
    }

    #[tokio::test]
    async fn retrain_publishes_new_generation() {
        let lc = lifecycle(lof_only());
        lc.ensure_trained(&table(&[1.0, 2.0, 3.0])).await.unwrap();

        let outcome = lc.retrain(&table(&[5.0, 6.0, 7.0, 8.0])).await;
        assert_eq!(
            outcome,
            RetrainOutcome::Retrained {
                generation: 2,
                strategies_trained: 1
            }
        );
        assert_eq!(lc.current().unwrap().training_rows, 4);
    }

    #[tokio::test]
    async fn empty_retrain_is_skipped() {
        let lc = lifecycle(lof_only());
        assert_eq!(lc.retrain(&FeatureTable::new(0)).await, RetrainOutcome::Skipped);
        assert_eq!(lc.state(), LifecycleState::Untrained);
    }

    #[tokio::test]
    async fn failed_retrain_keeps_previous_generation() {
        let lc = lifecycle(lof_only());
        let g1 = lc.ensure_trained(&table(&[1.0, 2.0, 3.0])).await.unwrap();

        // A single row cannot train a neighbour-based strategy.
        let outcome = lc.retrain(&table(&[9.0])).await;
        assert!(matches!(outcome, RetrainOutcome::Failed(_)));
        assert!(Arc::ptr_eq(&g1, &lc.current().unwrap()));
    }

    #[tokio::test]
    async fn initial_failure_stays_untrained() {
        let lc = lifecycle(lof_only());
        assert!(lc.ensure_trained(&table(&[9.0])).await.is_err());
        assert_eq!(lc.state(), LifecycleState::Untrained);
    }

    #[tokio::test]
    async fn empty_roster_still_publishes() {
        let lc = lifecycle(EngineConfig::statistical_only());
        let g = lc.ensure_trained(&table(&[9.0])).await.unwrap();
        assert_eq!(g.strategies.len(), 0);
        assert_eq!(lc.state(), LifecycleState::Trained);
    }

    #[tokio::test]
    async fn concurrent_retrain_is_coalesced() {
        let lc = lifecycle(lof_only());
        let _held = lc.writer.lock().await;
        assert_eq!(lc.retrain(&table(&[1.0, 2.0])).await, RetrainOutcome::Coalesced);
        assert_eq!(lc.diagnostics.snapshot().retrains_coalesced, 1);
    }

    #[tokio::test]
    async fn partial_strategy_failure_is_isolated() {
        let mut config = EngineConfig::default();
        config.strategies = vec![StrategyKind::Autoencoder, StrategyKind::IsolationForest];
        // Autoencoder trains on one row; the forest needs two.
        let lc = lifecycle(config);
        let g = lc.ensure_trained(&table(&[3.0])).await.unwrap();
        assert_eq!(g.trained_count(), 1);
        assert_eq!(g.active().next().unwrap().name(), "autoencoder");
        assert_eq!(lc.diagnostics.snapshot().strategy_failures, 1);
    }
}
