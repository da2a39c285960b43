//! Periodic retraining and health checks.

use std::sync::Arc;

use sentinel_engine::{EnsembleEngine, RetrainOutcome, TrainingDataSource};
use sentinel_types::HealthStatus;
use tokio::sync::watch;
use tokio::time::{interval_at, Duration, Instant};

use crate::config::SchedulerConfig;

/// Drives `retrain_from` and `health` on fixed intervals until stopped.
pub struct RetrainScheduler {
    config: SchedulerConfig,
    engine: Arc<EnsembleEngine>,
    source: Arc<dyn TrainingDataSource>,
    shutdown_tx: watch::Sender<bool>,
}

impl RetrainScheduler {
    /// Scheduler that retrains from the engine's own recent-sample window.
    pub fn new(config: SchedulerConfig, engine: Arc<EnsembleEngine>) -> Arc<Self> {
        let source: Arc<dyn TrainingDataSource> = engine.recent_window();
        Self::with_source(config, engine, source)
    }

    pub fn with_source(
        config: SchedulerConfig,
        engine: Arc<EnsembleEngine>,
        source: Arc<dyn TrainingDataSource>,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            config,
            engine,
            source,
            shutdown_tx,
        })
    }

    /// Run both loops until [`stop`](Self::stop) is called.
    pub async fn start(self: Arc<Self>) {
        tracing::info!(
            retrain_secs = self.config.retrain_interval_secs,
            health_secs = self.config.health_check_interval_secs,
            "Scheduler started"
        );

        let retrain_scheduler = self.clone();
        let mut retrain_shutdown = self.shutdown_tx.subscribe();
        let retrain_handle = tokio::spawn(async move {
            let period = Duration::from_secs(retrain_scheduler.config.retrain_interval_secs.max(1));
            let mut interval = interval_at(Instant::now() + period, period);

            while !*retrain_shutdown.borrow() {
                tokio::select! {
                    _ = interval.tick() => {
                        retrain_scheduler.retrain_once().await;
                    }
                    _ = retrain_shutdown.changed() => break,
                }
            }
        });

        let health_scheduler = self.clone();
        let mut health_shutdown = self.shutdown_tx.subscribe();
        let health_handle = tokio::spawn(async move {
            let period =
                Duration::from_secs(health_scheduler.config.health_check_interval_secs.max(1));
            let mut interval = interval_at(Instant::now() + period, period);

            while !*health_shutdown.borrow() {
                tokio::select! {
                    _ = interval.tick() => {
                        health_scheduler.check_health();
                    }
                    _ = health_shutdown.changed() => break,
                }
            }
        });

        let _ = tokio::join!(retrain_handle, health_handle);
        tracing::info!("Scheduler stopped");
    }

    /// Stop both loops.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// One retrain pass against the configured data source.
    pub async fn retrain_once(&self) -> RetrainOutcome {
        let outcome = self.engine.retrain_from(self.source.as_ref()).await;
        match &outcome {
            RetrainOutcome::Retrained {
                generation,
                strategies_trained,
            } => tracing::info!(generation, strategies_trained, "Models retrained"),
            RetrainOutcome::Skipped => tracing::debug!("Retrain skipped: no recent data"),
            RetrainOutcome::Coalesced => tracing::debug!("Retrain coalesced with one in flight"),
            RetrainOutcome::Failed(reason) => tracing::error!(%reason, "Retrain failed"),
        }
        outcome
    }

    /// One health probe; warns when the engine is not ready.
    pub fn check_health(&self) -> HealthStatus {
        let health = self.engine.health();
        if !health.healthy {
            tracing::warn!(
                algorithms_loaded = health.algorithms_loaded,
                total_algorithms = health.total_algorithms,
                "Detector is not healthy"
            );
        }
        health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_engine::EngineConfig;
    use sentinel_types::MetricSample;

    fn engine() -> Arc<EnsembleEngine> {
        Arc::new(EnsembleEngine::new(EngineConfig::statistical_only()).unwrap())
    }

    fn batch() -> Vec<MetricSample> {
        (0..10)
            .map(|i| MetricSample::new("cpu_usage", i as f64))
            .collect()
    }

    #[tokio::test]
    async fn retrain_once_skips_on_empty_window() {
        let scheduler = RetrainScheduler::new(SchedulerConfig::default(), engine());
        assert_eq!(scheduler.retrain_once().await, RetrainOutcome::Skipped);
        assert!(!scheduler.check_health().healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_retrain_advances_generation() {
        let engine = engine();
        engine.detect(&batch()).await;
        assert_eq!(engine.health().generation, Some(1));

        let config = SchedulerConfig {
            retrain_interval_secs: 60,
            health_check_interval_secs: 30,
        };
        let scheduler = RetrainScheduler::new(config, engine.clone());
        let handle = tokio::spawn(scheduler.clone().start());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(engine.health().generation, Some(2));

        scheduler.stop();
        handle.await.unwrap();
    }
}
