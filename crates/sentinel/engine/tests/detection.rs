//! End-to-end behaviour of the engine surface: detect, retrain, readiness.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sentinel_engine::{
    ColumnData, EngineConfig, EngineResult, EnsembleEngine, FeatureExtractor, FeaturePreparer,
    FeatureTable, MetricFeatureExtractor, RetrainOutcome, StrategyKind,
};
use sentinel_types::{AnomalySeverity, AnomalyType, MetricSample};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn cpu_spike(name: &str) -> Vec<MetricSample> {
    let mut batch: Vec<MetricSample> = (0..19)
        .map(|i| {
            MetricSample::new(name, 10.0 + (i % 4) as f64 * 0.05)
                .with_label("service", "checkout")
                .with_label("namespace", "shop")
        })
        .collect();
    batch.push(
        MetricSample::new(name, 1000.0)
            .with_label("service", "checkout")
            .with_label("namespace", "shop"),
    );
    batch
}

fn steady(name: &str, base: f64) -> Vec<MetricSample> {
    (0..20)
        .map(|i| MetricSample::new(name, base + (i % 5) as f64 * 0.1))
        .collect()
}

fn light_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.isolation_forest.n_trees = 25;
    config.autoencoder.epochs = 10;
    config
}

/// Extractor that only yields label columns.
struct LabelsOnly;

impl FeatureExtractor for LabelsOnly {
    fn extract(&self, batch: &[MetricSample]) -> EngineResult<FeatureTable> {
        let mut table = FeatureTable::new(batch.len());
        table.push_column(
            "metric_name",
            ColumnData::Text(batch.iter().map(|s| Some(s.name.clone())).collect()),
        )?;
        Ok(table)
    }
}

/// Extractor that drops the last row.
struct Truncating;

impl FeatureExtractor for Truncating {
    fn extract(&self, batch: &[MetricSample]) -> EngineResult<FeatureTable> {
        MetricFeatureExtractor.extract(&batch[..batch.len().saturating_sub(1)])
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_batch_yields_nothing_and_trains_nothing() {
    let engine = EnsembleEngine::new(EngineConfig::default()).unwrap();
    assert!(engine.detect(&[]).await.is_empty());
    assert!(!engine.is_ready());
    assert_eq!(engine.diagnostics().batches_processed, 0);
}

#[tokio::test]
async fn statistical_detector_alone_flags_cpu_spike() {
    let engine = EnsembleEngine::new(EngineConfig::statistical_only()).unwrap();
    let batch = cpu_spike("container_cpu_usage");

    let results = engine.detect(&batch).await;
    assert_eq!(results.len(), 1);

    let anomaly = &results[0];
    assert_eq!(anomaly.anomaly_type, AnomalyType::ResourceUsage);
    assert!(anomaly.metadata.vote_ratio >= 0.5);
    assert_eq!(anomaly.metadata.total_voters, 1);
    assert_eq!(anomaly.metadata.voted_by, vec!["statistical".to_string()]);
    assert_eq!(anomaly.severity, AnomalySeverity::Critical);
    assert_eq!(anomaly.metadata.original_metric, batch[19]);
    assert_eq!(anomaly.service, "checkout");
    assert_eq!(anomaly.namespace, "shop");
    assert_eq!(anomaly.features["container_cpu_usage"], 1000.0);
    assert_eq!(
        anomaly.description,
        "Unusual resource usage detected in container_cpu_usage for service checkout (value: 1000)"
    );
}

#[tokio::test]
async fn three_row_batch_stays_below_three_sigma() {
    let engine = EnsembleEngine::new(EngineConfig::statistical_only()).unwrap();
    let batch = vec![
        MetricSample::new("cpu_usage", 10.0),
        MetricSample::new("cpu_usage", 10.2),
        MetricSample::new("cpu_usage", 1000.0),
    ];
    assert!(engine.detect(&batch).await.is_empty());
    assert!(engine.is_ready());
}

#[tokio::test]
async fn full_ensemble_reports_in_batch_order() {
    let engine = EnsembleEngine::new(light_config()).unwrap();
    let mut batch = cpu_spike("cpu_usage");
    batch.extend(cpu_spike("network_rx_bytes"));

    let results = engine.detect(&batch).await;
    assert!(results.len() <= batch.len());
    assert!(results.iter().any(|r| r.metadata.original_metric.value == 1000.0));

    // Ids end with `_<batch>_<row>`.
    let positions: Vec<usize> = results
        .iter()
        .map(|r| r.id.as_str().rsplit('_').next().unwrap().parse().unwrap())
        .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);

    for r in &results {
        assert_eq!(r.metadata.total_voters, 4);
        assert_eq!(r.metadata.algorithms.len(), 4);
        assert_eq!(r.metadata.generation, Some(1));
    }
}

#[tokio::test]
async fn ids_are_unique_across_repeated_batches() {
    let engine = EnsembleEngine::new(EngineConfig::statistical_only()).unwrap();
    let batch = cpu_spike("cpu_usage");

    let first = engine.detect(&batch).await;
    let second = engine.detect(&batch).await;
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0].id, second[0].id);
    assert_eq!(first[0].metadata.fingerprint, second[0].metadata.fingerprint);
}

#[tokio::test]
async fn constant_metric_is_never_flagged() {
    let engine = EnsembleEngine::new(EngineConfig::statistical_only()).unwrap();
    let batch: Vec<MetricSample> = (0..40).map(|_| MetricSample::new("memory_rss", 4e9)).collect();
    assert!(engine.detect(&batch).await.is_empty());
}

#[tokio::test]
async fn no_numeric_features_skips_training() {
    let engine =
        EnsembleEngine::with_extractor(EngineConfig::default(), Arc::new(LabelsOnly)).unwrap();
    assert!(engine.detect(&cpu_spike("cpu_usage")).await.is_empty());
    assert!(!engine.is_ready());
    assert_eq!(engine.diagnostics().batches_degraded, 0);
}

#[tokio::test]
async fn misaligned_extractor_degrades_whole_batch() {
    let engine =
        EnsembleEngine::with_extractor(EngineConfig::statistical_only(), Arc::new(Truncating))
            .unwrap();
    assert!(engine.detect(&cpu_spike("cpu_usage")).await.is_empty());

    let diag = engine.diagnostics();
    assert_eq!(diag.batches_degraded, 1);
    assert_eq!(diag.last_error.unwrap().stage, "extract");
}

#[tokio::test]
async fn batch_of_unfitted_metrics_is_skipped_not_flagged() {
    let engine = EnsembleEngine::new(light_config()).unwrap();
    engine.detect(&steady("cpu_usage", 10.0)).await;
    assert_eq!(engine.health().generation, Some(1));

    let results = engine.detect(&steady("request_latency_ms", 120.0)).await;
    assert!(results.is_empty());

    let diag = engine.diagnostics();
    assert_eq!(diag.transform_failures, 1);
    assert_eq!(diag.batches_degraded, 0);

    // The fitted metric is still analyzed normally.
    let results = engine.detect(&cpu_spike("cpu_usage")).await;
    assert!(results.iter().any(|r| r.metadata.original_metric.value == 1000.0));
    assert_eq!(engine.diagnostics().transform_failures, 1);
}

#[tokio::test]
async fn statistical_only_engine_analyzes_any_metric() {
    let engine = EnsembleEngine::new(EngineConfig::statistical_only()).unwrap();
    engine.detect(&steady("cpu_usage", 10.0)).await;

    let results = engine.detect(&cpu_spike("request_latency_ms")).await;
    assert_eq!(results.len(), 1);
    assert_eq!(engine.diagnostics().transform_failures, 0);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_detection_trains_lazily() {
    let engine = EnsembleEngine::new(light_config()).unwrap();
    assert!(!engine.is_ready());
    engine.detect(&cpu_spike("cpu_usage")).await;
    assert!(engine.is_ready());
    assert!(engine.health().last_training.is_some());
}

#[tokio::test]
async fn concurrent_first_detections_train_once() {
    let engine = EnsembleEngine::new(EngineConfig::statistical_only()).unwrap();
    let a = cpu_spike("cpu_usage");
    let b = cpu_spike("memory_rss");
    let (ra, rb) = tokio::join!(engine.detect(&a), engine.detect(&b));
    assert_eq!(ra.len(), 1);
    assert_eq!(rb.len(), 1);
    assert_eq!(engine.health().generation, Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn detections_during_retrain_see_one_generation_each() {
    let engine = Arc::new(EnsembleEngine::new(light_config()).unwrap());
    engine.detect(&cpu_spike("cpu_usage")).await;
    assert_eq!(engine.health().generation, Some(1));

    let done = Arc::new(AtomicBool::new(false));
    let watcher = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while !done.load(Ordering::SeqCst) {
                seen.push(engine.health().generation);
                tokio::task::yield_now().await;
            }
            seen.push(engine.health().generation);
            seen
        })
    };

    let retrainer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut outcomes = Vec::new();
            for _ in 0..3 {
                outcomes.push(engine.retrain_samples(&cpu_spike("cpu_usage")).await);
            }
            outcomes
        })
    };

    let detectors: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.detect(&cpu_spike("cpu_usage")).await })
        })
        .collect();

    for handle in detectors {
        let results = handle.await.unwrap();
        assert!(!results.is_empty());
        let generation = results[0].metadata.generation;
        assert!(generation.is_some());
        assert!(results.iter().all(|r| r.metadata.generation == generation));
    }

    let outcomes = retrainer.await.unwrap();
    assert!(matches!(outcomes[0], RetrainOutcome::Retrained { .. }));
    done.store(true, Ordering::SeqCst);

    let seen = watcher.await.unwrap();
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(seen.last().copied().flatten(), Some(4));
}

#[tokio::test]
async fn empty_retrain_leaves_readiness_unchanged() {
    let engine = EnsembleEngine::new(EngineConfig::statistical_only()).unwrap();
    assert_eq!(engine.retrain(&FeatureTable::new(0)).await, RetrainOutcome::Skipped);
    assert!(!engine.is_ready());

    engine.detect(&cpu_spike("cpu_usage")).await;
    assert!(engine.is_ready());
    assert_eq!(engine.retrain(&FeatureTable::new(0)).await, RetrainOutcome::Skipped);
    assert!(engine.is_ready());
    assert_eq!(engine.health().generation, Some(1));
}

#[tokio::test]
async fn retrain_from_window_publishes_new_generation() {
    let config = EngineConfig {
        strategies: vec![StrategyKind::IsolationForest, StrategyKind::LocalOutlierFactor],
        ..light_config()
    };
    let engine = EnsembleEngine::new(config).unwrap();
    engine.detect(&cpu_spike("cpu_usage")).await;

    let window = engine.recent_window();
    let outcome = engine.retrain_from(window.as_ref()).await;
    assert_eq!(
        outcome,
        RetrainOutcome::Retrained {
            generation: 2,
            strategies_trained: 2
        }
    );

    let health = engine.health();
    assert_eq!(health.generation, Some(2));
    assert_eq!(health.algorithms_loaded, 3);
    assert_eq!(health.total_algorithms, 3);
}

#[tokio::test]
async fn failed_retrain_keeps_serving_previous_generation() {
    let config = EngineConfig {
        strategies: vec![StrategyKind::LocalOutlierFactor],
        ..light_config()
    };
    let engine = EnsembleEngine::new(config).unwrap();
    engine.detect(&cpu_spike("cpu_usage")).await;

    let outcome = engine
        .retrain_samples(&[MetricSample::new("cpu_usage", 1.0)])
        .await;
    assert!(matches!(outcome, RetrainOutcome::Failed(_)));
    assert!(engine.is_ready());
    assert_eq!(engine.health().generation, Some(1));
    assert_eq!(engine.diagnostics().training_failures, 1);
}

// ---------------------------------------------------------------------------
// Feature preparation
// ---------------------------------------------------------------------------

#[test]
fn prepare_with_fitted_transform_is_idempotent() {
    let batch = cpu_spike("cpu_usage");
    let table = MetricFeatureExtractor.extract(&batch).unwrap();
    let preparer = FeaturePreparer::new(10, 0.95);

    let fitted = preparer.fit(&table).unwrap();
    let a = preparer.prepare(&table, Some(&fitted)).unwrap();
    let b = preparer.prepare(&table, Some(&fitted)).unwrap();
    assert_eq!(a.matrix, b.matrix);
    assert!(a.fitted.is_none());
}
