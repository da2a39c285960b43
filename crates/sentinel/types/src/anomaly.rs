//! Anomaly records produced by the ensemble and their classification rules.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metric::MetricSample;

/// Combined score at or above which an anomaly is critical.
pub const CRITICAL_THRESHOLD: f64 = 0.9;
/// Combined score at or above which an anomaly is high.
pub const HIGH_THRESHOLD: f64 = 0.7;
/// Combined score at or above which an anomaly is medium.
pub const MEDIUM_THRESHOLD: f64 = 0.5;

// ── Identifier ──────────────────────────────────────────────────────────

/// Identifier of a single detection event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnomalyId(pub String);

impl AnomalyId {
    /// Build an id from the detection time, a content fingerprint of the
    /// originating metric, and the position of the sample in the engine's
    /// batch sequence.
    ///
    /// The `(batch_seq, row)` pair is unique for the life of an engine, so
    /// two detections never share an id even when the metric content and
    /// timestamp second coincide.
    pub fn derive(
        detected_at: DateTime<Utc>,
        fingerprint: &str,
        batch_seq: u64,
        row: usize,
    ) -> Self {
        Self(format!(
            "anomaly_{}_{}_{}_{}",
            detected_at.format("%Y%m%d_%H%M%S"),
            fingerprint,
            batch_seq,
            row
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AnomalyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Anomaly Type ────────────────────────────────────────────────────────

/// What kind of behaviour the anomalous metric describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    ResourceUsage,
    TrafficPattern,
    ErrorRate,
    Latency,
    Security,
    Performance,
}

impl AnomalyType {
    /// Classify a metric by name.
    ///
    /// Case-insensitive substring match, first rule wins:
    /// `cpu`/`memory` → resource usage, `network` → traffic pattern,
    /// `error`/`failed` → error rate, `latency`/`duration` → latency,
    /// `security`/`auth` → security, anything else → performance.
    pub fn classify(metric_name: &str) -> Self {
        const RULES: &[(&[&str], AnomalyType)] = &[
            (&["cpu", "memory"], AnomalyType::ResourceUsage),
            (&["network"], AnomalyType::TrafficPattern),
            (&["error", "failed"], AnomalyType::ErrorRate),
            (&["latency", "duration"], AnomalyType::Latency),
            (&["security", "auth"], AnomalyType::Security),
        ];

        let name = metric_name.to_lowercase();
        RULES
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| name.contains(n)))
            .map(|(_, kind)| *kind)
            .unwrap_or(AnomalyType::Performance)
    }

    /// Human-readable description of an anomaly of this type.
    pub fn describe(self, metric: &MetricSample) -> String {
        let name = &metric.name;
        let service = metric.service();
        match self {
            Self::ResourceUsage => format!(
                "Unusual resource usage detected in {} for service {} (value: {})",
                name, service, metric.value
            ),
            Self::TrafficPattern => format!(
                "Abnormal traffic pattern detected in {} for service {}",
                name, service
            ),
            Self::ErrorRate => format!(
                "Elevated error rate detected in {} for service {}",
                name, service
            ),
            Self::Latency => format!(
                "Unusual latency pattern detected in {} for service {}",
                name, service
            ),
            Self::Security => format!(
                "Security anomaly detected in {} for service {}",
                name, service
            ),
            Self::Performance => format!(
                "Performance anomaly detected in {} for service {}",
                name, service
            ),
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResourceUsage => write!(f, "resource_usage"),
            Self::TrafficPattern => write!(f, "traffic_pattern"),
            Self::ErrorRate => write!(f, "error_rate"),
            Self::Latency => write!(f, "latency"),
            Self::Security => write!(f, "security"),
            Self::Performance => write!(f, "performance"),
        }
    }
}

// ── Severity ────────────────────────────────────────────────────────────

/// Severity of a detected anomaly. Ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnomalySeverity {
    /// Severity from the ensemble confidence and vote ratio.
    ///
    /// Uses `combined = (confidence + vote_ratio) / 2` against inclusive
    /// lower bounds 0.9 / 0.7 / 0.5.
    pub fn from_scores(confidence: f64, vote_ratio: f64) -> Self {
        Self::from_combined((confidence + vote_ratio) / 2.0)
    }

    pub fn from_combined(combined: f64) -> Self {
        if combined >= CRITICAL_THRESHOLD {
            Self::Critical
        } else if combined >= HIGH_THRESHOLD {
            Self::High
        } else if combined >= MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ── Anomaly Result ──────────────────────────────────────────────────────

/// Audit trail attached to every anomaly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyMetadata {
    pub vote_ratio: f64,
    pub votes: usize,
    pub total_voters: usize,
    /// Every voter that took part (active strategies + statistical).
    pub algorithms: Vec<String>,
    /// Voters that flagged this sample.
    pub voted_by: Vec<String>,
    /// Content hash of the originating metric; stable across repeated
    /// detections of the same sample.
    pub fingerprint: String,
    /// Model generation the batch was scored with, if any.
    pub generation: Option<u64>,
    pub original_metric: MetricSample,
}

/// A confirmed anomaly, ready for the alerting layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub id: AnomalyId,
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub severity: AnomalySeverity,
    pub description: String,
    pub service: String,
    pub namespace: String,
    /// Ensemble confidence, in `[0, 1]`.
    pub score: f64,
    /// Configured decision threshold, carried for audit.
    pub threshold: f64,
    /// Numeric features of the originating row (missing cells as `0.0`).
    pub features: BTreeMap<String, f64>,
    pub labels: BTreeMap<String, String>,
    pub detected_at: DateTime<Utc>,
    pub metadata: AnomalyMetadata,
}
