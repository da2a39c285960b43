//! Raw metric observations as delivered by the ingestion layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label carrying the owning service.
pub const SERVICE_LABEL: &str = "service";

/// Label carrying the Kubernetes namespace.
pub const NAMESPACE_LABEL: &str = "namespace";

/// One observation of a named metric.
///
/// Owned by the caller; the engine only ever reads it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Metric name, e.g. `container_cpu_usage_seconds`.
    pub name: String,
    /// Observed value.
    pub value: f64,
    /// Metric labels (service, namespace, pod, ...).
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// When the value was observed.
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    /// Create a sample stamped with the current time and no labels.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            labels: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Builder-style label insertion.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The `service` label, or `"unknown"`.
    pub fn service(&self) -> &str {
        self.labels
            .get(SERVICE_LABEL)
            .map(String::as_str)
            .unwrap_or("unknown")
    }

    /// The `namespace` label, or `"default"`.
    pub fn namespace(&self) -> &str {
        self.labels
            .get(NAMESPACE_LABEL)
            .map(String::as_str)
            .unwrap_or("default")
    }
}
