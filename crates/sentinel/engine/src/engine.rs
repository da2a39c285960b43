//! The ensemble engine facade.
//!
//! `detect`, `retrain`, `is_ready` and `health` are the whole external
//! surface. None of them return errors: internal failures are logged,
//! counted in [`EngineDiagnostics`] and degrade to an empty result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use sentinel_types::{AnomalyResult, HealthStatus, MetricSample, STATISTICAL_VOTER};

use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticsSnapshot, EngineDiagnostics};
use crate::error::{EngineError, EngineResult};
use crate::features::{
    FeatureExtractor, FeatureMatrix, FeaturePreparer, FeatureTable, MetricFeatureExtractor,
};
use crate::lifecycle::{LifecycleState, ModelGeneration, RetrainOutcome, TrainingLifecycle};
use crate::statistical::StatisticalOutlierDetector;
use crate::synthesis::{BatchContext, ResultSynthesizer};
use crate::voting::{EnsembleVoter, StrategyOutput};
use crate::window::{RecentWindow, TrainingDataSource};

pub struct EnsembleEngine {
    config: EngineConfig,
    extractor: Arc<dyn FeatureExtractor>,
    preparer: FeaturePreparer,
    statistical: StatisticalOutlierDetector,
    voter: EnsembleVoter,
    synthesizer: ResultSynthesizer,
    lifecycle: TrainingLifecycle,
    window: Arc<RecentWindow>,
    batch_seq: AtomicU64,
    diagnostics: Arc<EngineDiagnostics>,
}

impl EnsembleEngine {
    /// Engine with the default metric extractor.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::with_extractor(config, Arc::new(MetricFeatureExtractor))
    }

    pub fn with_extractor(
        config: EngineConfig,
        extractor: Arc<dyn FeatureExtractor>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let diagnostics = Arc::new(EngineDiagnostics::default());
        Ok(Self {
            extractor,
            preparer: FeaturePreparer::new(config.reduction_min_columns, config.variance_retained),
            statistical: StatisticalOutlierDetector::new(config.z_score_threshold),
            voter: EnsembleVoter::new(config.vote_threshold, config.default_confidence),
            synthesizer: ResultSynthesizer::new(config.threshold),
            lifecycle: TrainingLifecycle::new(config.clone(), Arc::clone(&diagnostics)),
            window: Arc::new(RecentWindow::new(config.window_size)),
            batch_seq: AtomicU64::new(0),
            diagnostics,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Detection ───────────────────────────────────────────────────────

    /// Anomalies in `batch`, in batch order. Never fails; an internal error
    /// yields an empty list.
    pub async fn detect(&self, batch: &[MetricSample]) -> Vec<AnomalyResult> {
        if batch.is_empty() {
            return Vec::new();
        }

        let seq = self.batch_seq.fetch_add(1, Ordering::SeqCst);
        self.window.record(batch);

        match self.try_detect(seq, batch).await {
            Ok(results) => {
                self.diagnostics.batch_processed();
                debug!(
                    batch = seq,
                    samples = batch.len(),
                    anomalies = results.len(),
                    "Batch analyzed"
                );
                results
            }
            Err(e) => {
                warn!(
                    batch = seq,
                    stage = e.stage(),
                    error = %e,
                    "Detection degraded to empty result"
                );
                self.diagnostics.batch_degraded(&e);
                Vec::new()
            }
        }
    }

    async fn try_detect(
        &self,
        seq: u64,
        batch: &[MetricSample],
    ) -> EngineResult<Vec<AnomalyResult>> {
        let table = self.extractor.extract(batch)?;
        if table.row_count() != batch.len() {
            return Err(EngineError::MalformedBatch(format!(
                "extractor produced {} rows for {} samples",
                table.row_count(),
                batch.len()
            )));
        }
        if !table.has_numeric_columns() {
            debug!(batch = seq, "No numeric features; nothing to analyze");
            return Ok(Vec::new());
        }

        let generation = match self.lifecycle.ensure_trained(&table).await {
            Ok(generation) => Some(generation),
            Err(e) => {
                warn!(
                    batch = seq,
                    stage = e.stage(),
                    error = %e,
                    "Training failed; statistical detector only"
                );
                self.diagnostics.training_failed(&e);
                None
            }
        };

        // Strategies only see features shaped like their training data; a
        // batch the fitted transform rejects is skipped whole.
        let outputs = match &generation {
            Some(generation) if generation.active().next().is_some() => {
                let prepared = self.preparer.prepare(&table, Some(&generation.transform));
                let Some(prepared) = prepared else {
                    warn!(batch = seq, "Feature preparation failed; skipping batch");
                    self.diagnostics.transform_failed();
                    return Ok(Vec::new());
                };
                self.strategy_outputs(seq, generation, &prepared.matrix)
            }
            _ => Vec::new(),
        };

        let flagged = self.statistical.flag(&table);
        let decisions = self.voter.vote(&outputs, &flagged, batch.len());

        let mut algorithms: Vec<String> = outputs.iter().map(|o| o.name.clone()).collect();
        algorithms.push(STATISTICAL_VOTER.to_string());
        let ctx = BatchContext {
            batch_seq: seq,
            detected_at: Utc::now(),
            algorithms,
            generation: generation.as_ref().map(|g| g.id),
        };

        decisions
            .iter()
            .filter(|c| c.is_anomaly)
            .map(|c| self.synthesizer.synthesize(c, &batch[c.index], &table, &ctx))
            .collect()
    }

    /// Classify and score with every trained strategy. A failing strategy
    /// is left out of this batch's vote.
    fn strategy_outputs(
        &self,
        seq: u64,
        generation: &ModelGeneration,
        matrix: &FeatureMatrix,
    ) -> Vec<StrategyOutput> {
        generation
            .active()
            .filter_map(|strategy| {
                let result = strategy
                    .classify(matrix)
                    .and_then(|classifications| Ok((classifications, strategy.score(matrix)?)));
                match result {
                    Ok((classifications, scores)) => Some(StrategyOutput {
                        name: strategy.name().to_string(),
                        classifications,
                        scores,
                    }),
                    Err(e) => {
                        warn!(
                            batch = seq,
                            strategy = strategy.name(),
                            error = %e,
                            "Strategy excluded from vote"
                        );
                        self.diagnostics.strategy_failed(&e);
                        None
                    }
                }
            })
            .collect()
    }

    // ── Training ────────────────────────────────────────────────────────

    /// Refit on `recent_data`. An empty table is a logged no-op.
    pub async fn retrain(&self, recent_data: &FeatureTable) -> RetrainOutcome {
        self.lifecycle.retrain(recent_data).await
    }

    /// Extract `samples` and refit on them.
    pub async fn retrain_samples(&self, samples: &[MetricSample]) -> RetrainOutcome {
        if samples.is_empty() {
            debug!("No samples to retrain on");
            return RetrainOutcome::Skipped;
        }
        match self.extractor.extract(samples) {
            Ok(table) => self.retrain(&table).await,
            Err(e) => {
                warn!(stage = e.stage(), error = %e, "Could not extract retraining data");
                self.diagnostics.training_failed(&e);
                RetrainOutcome::Failed(e.to_string())
            }
        }
    }

    /// Pull recent data from `source` and refit on it.
    pub async fn retrain_from(&self, source: &dyn TrainingDataSource) -> RetrainOutcome {
        let samples = source.recent_samples().await;
        self.retrain_samples(&samples).await
    }

    // ── Introspection ───────────────────────────────────────────────────

    pub fn is_ready(&self) -> bool {
        self.lifecycle.state() == LifecycleState::Trained
    }

    pub fn health(&self) -> HealthStatus {
        let generation = self.lifecycle.current();
        HealthStatus {
            healthy: generation.is_some(),
            last_training: generation.as_ref().map(|g| g.trained_at),
            algorithms_loaded: generation.as_ref().map_or(0, |g| g.trained_count()) + 1,
            total_algorithms: self.lifecycle.roster().len() + 1,
            generation: generation.as_ref().map(|g| g.id),
        }
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// The window of recently analyzed samples, the default retraining source.
    pub fn recent_window(&self) -> Arc<RecentWindow> {
        Arc::clone(&self.window)
    }
}

impl std::fmt::Debug for EnsembleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleEngine")
            .field("lifecycle", &self.lifecycle)
            .field("batches", &self.batch_seq.load(Ordering::Relaxed))
            .finish()
    }
}
