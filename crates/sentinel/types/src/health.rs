use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Readiness summary consumed by the HTTP health endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// True once a model generation has been trained.
    pub healthy: bool,
    /// When the live generation was trained.
    pub last_training: Option<DateTime<Utc>>,
    /// Voters currently able to vote (trained strategies + statistical).
    pub algorithms_loaded: usize,
    /// Voters configured (enabled strategies + statistical).
    pub total_algorithms: usize,
    /// Sequence number of the live generation.
    pub generation: Option<u64>,
}
