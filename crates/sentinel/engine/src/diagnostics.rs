//! Internal failure counters.
//!
//! The public engine surface never returns errors; these counters make the
//! degraded paths visible to operators.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Default)]
pub struct EngineDiagnostics {
    batches_processed: AtomicU64,
    batches_degraded: AtomicU64,
    transform_failures: AtomicU64,
    strategy_failures: AtomicU64,
    training_failures: AtomicU64,
    retrains_coalesced: AtomicU64,
    last_error: Mutex<Option<LastError>>,
}

/// Most recent internal failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    pub stage: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Point-in-time copy of the counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub batches_processed: u64,
    pub batches_degraded: u64,
    pub transform_failures: u64,
    pub strategy_failures: u64,
    pub training_failures: u64,
    pub retrains_coalesced: u64,
    pub last_error: Option<LastError>,
}

impl EngineDiagnostics {
    pub fn batch_processed(&self) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// A whole batch fell back to an empty result.
    pub fn batch_degraded(&self, error: &EngineError) {
        self.batches_degraded.fetch_add(1, Ordering::Relaxed);
        self.record(error);
    }

    pub fn transform_failed(&self) {
        self.transform_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(LastError {
            stage: "transform".into(),
            message: "feature preparation returned no matrix".into(),
            at: Utc::now(),
        });
    }

    pub fn strategy_failed(&self, error: &EngineError) {
        self.strategy_failures.fetch_add(1, Ordering::Relaxed);
        self.record(error);
    }

    pub fn training_failed(&self, error: &EngineError) {
        self.training_failures.fetch_add(1, Ordering::Relaxed);
        self.record(error);
    }

    pub fn retrain_coalesced(&self) {
        self.retrains_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    fn record(&self, error: &EngineError) {
        *self.last_error.lock() = Some(LastError {
            stage: error.stage().to_string(),
            message: error.to_string(),
            at: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            batches_degraded: self.batches_degraded.load(Ordering::Relaxed),
            transform_failures: self.transform_failures.load(Ordering::Relaxed),
            strategy_failures: self.strategy_failures.load(Ordering::Relaxed),
            training_failures: self.training_failures.load(Ordering::Relaxed),
            retrains_coalesced: self.retrains_coalesced.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }
}
