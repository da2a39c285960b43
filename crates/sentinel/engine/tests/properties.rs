//! Property tests over arbitrary metric batches.

use proptest::prelude::*;
use sentinel_engine::{EngineConfig, EnsembleEngine};
use sentinel_types::{AnomalySeverity, AnomalyType, MetricSample};

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_sample() -> impl Strategy<Value = MetricSample> {
    (
        prop_oneof![
            Just("cpu_usage"),
            Just("memory_rss"),
            Just("network_rx_bytes"),
            Just("http_errors_total"),
            Just("request_duration_ms"),
            Just("queue_depth"),
        ],
        prop_oneof![-1e6f64..1e6, Just(0.0), Just(f64::NAN)],
        prop_oneof![Just("api"), Just("worker")],
    )
        .prop_map(|(name, value, service)| {
            MetricSample::new(name, value).with_label("service", service)
        })
}

fn arb_batch(max: usize) -> impl Strategy<Value = Vec<MetricSample>> {
    prop::collection::vec(arb_sample(), 0..max)
}

fn small_ensemble() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.isolation_forest.n_trees = 10;
    config.autoencoder.epochs = 3;
    config.local_outlier_factor.n_neighbors = 5;
    config
}

fn run<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn never_more_anomalies_than_samples(batch in arb_batch(40)) {
        let engine = EnsembleEngine::new(small_ensemble()).unwrap();
        let results = run(engine.detect(&batch));
        prop_assert!(results.len() <= batch.len());
    }

    #[test]
    fn ratios_and_confidence_stay_in_unit_interval(batch in arb_batch(40)) {
        let engine = EnsembleEngine::new(small_ensemble()).unwrap();
        for r in run(engine.detect(&batch)) {
            prop_assert!((0.0..=1.0).contains(&r.metadata.vote_ratio));
            prop_assert!((0.0..=1.0).contains(&r.score));
            prop_assert!(r.metadata.votes <= r.metadata.total_voters);
        }
    }

    #[test]
    fn records_are_consistent_with_their_metric(batch in arb_batch(30)) {
        let engine = EnsembleEngine::new(EngineConfig::statistical_only()).unwrap();
        for r in run(engine.detect(&batch)) {
            prop_assert_eq!(
                r.anomaly_type,
                AnomalyType::classify(&r.metadata.original_metric.name)
            );
            prop_assert_eq!(
                r.severity,
                AnomalySeverity::from_scores(r.score, r.metadata.vote_ratio)
            );
            prop_assert!(r.features.values().all(|v| v.is_finite()));
        }
    }
}
