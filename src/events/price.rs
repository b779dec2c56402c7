use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emitted once per aggregation cycle, successful or not.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregationEvent {
    pub symbol: String,
    pub outcome: CycleOutcome,
    pub source_prices: Vec<SourcePrice>,
    pub failed_sources: Vec<String>,
    pub rejected_outliers: usize,
    pub emitted_at: DateTime<Utc>,
}

impl AggregationEvent {
    pub fn success_count(&self) -> usize {
        self.source_prices.len()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourcePrice {
    pub source_name: String,
    pub price: f64,
    pub weight: f64,
    pub is_outlier: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Published { value: f64, contributing_sources: usize },
    InsufficientQuorum { valid: usize, required: usize },
    /// The symbol was untracked while the cycle ran; nothing was published.
    Discarded { value: f64 },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Published { .. } => "published",
            CycleOutcome::InsufficientQuorum { .. } => "insufficient_quorum",
            CycleOutcome::Discarded { .. } => "discarded",
        }
    }
}
