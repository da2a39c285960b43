//! Builds structured anomaly records from anomalous consensus decisions.

use chrono::{DateTime, Utc};

use sentinel_types::{
    AnomalyId, AnomalyMetadata, AnomalyResult, AnomalySeverity, AnomalyType, Consensus,
    MetricSample,
};

use crate::error::EngineResult;
use crate::features::FeatureTable;

/// Hex characters of the content hash kept in ids and metadata.
const FINGERPRINT_LEN: usize = 16;

/// Batch-wide facts shared by every record synthesized from one batch.
#[derive(Clone, Debug)]
pub struct BatchContext {
    pub batch_seq: u64,
    pub detected_at: DateTime<Utc>,
    /// Every voter that took part in the batch.
    pub algorithms: Vec<String>,
    pub generation: Option<u64>,
}

/// Content fingerprint of a metric: leading hex of a BLAKE3 hash of its
/// JSON form.
pub fn fingerprint(sample: &MetricSample) -> EngineResult<String> {
    let bytes = serde_json::to_vec(sample)?;
    let hash = blake3::hash(&bytes);
    Ok(hash.to_hex().as_str()[..FINGERPRINT_LEN].to_string())
}

#[derive(Debug, Clone)]
pub struct ResultSynthesizer {
    threshold: f64,
}

impl ResultSynthesizer {
    /// `threshold` is copied onto every record for audit.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn synthesize(
        &self,
        consensus: &Consensus,
        sample: &MetricSample,
        table: &FeatureTable,
        ctx: &BatchContext,
    ) -> EngineResult<AnomalyResult> {
        let fp = fingerprint(sample)?;
        let anomaly_type = AnomalyType::classify(&sample.name);

        Ok(AnomalyResult {
            id: AnomalyId::derive(ctx.detected_at, &fp, ctx.batch_seq, consensus.index),
            anomaly_type,
            severity: AnomalySeverity::from_scores(consensus.confidence, consensus.vote_ratio),
            description: anomaly_type.describe(sample),
            service: sample.service().to_string(),
            namespace: sample.namespace().to_string(),
            score: consensus.confidence,
            threshold: self.threshold,
            features: table.numeric_row(consensus.index),
            labels: sample.labels.clone(),
            detected_at: ctx.detected_at,
            metadata: AnomalyMetadata {
                vote_ratio: consensus.vote_ratio,
                votes: consensus.votes,
                total_voters: consensus.total_voters,
                algorithms: ctx.algorithms.clone(),
                voted_by: consensus.voted_by.clone(),
                fingerprint: fp,
                generation: ctx.generation,
                original_metric: sample.clone(),
            },
        })
    }
}
