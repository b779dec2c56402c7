pub mod connectors;
pub mod aggregator;
pub mod cache;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PriceSourceConfig {
    pub name: String,
    /// Falls back to the aggregator's default weight when unset.
    #[serde(default)]
    pub weight: Option<f64>,
    /// URL template, `{symbol}` is substituted per request.
    pub endpoint: String,
    pub format: ResponseFormat,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl PriceSourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::ConfigError("source name must not be empty".to_string()));
        }
        if let Some(weight) = self.weight {
            if !(weight > 0.0) || !weight.is_finite() {
                return Err(Error::ConfigError(format!(
                    "source {} has non-positive weight {}",
                    self.name, weight
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseFormat {
    /// `{"symbol": "...", "price": "12.34"}`
    Binance,
    /// `{"data": {"amount": "12.34", ...}}`
    Coinbase,
    /// Any JSON document, value located by RFC 6901 pointer.
    Json { pointer: String },
}

/// The latest accepted value for one symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPrice {
    pub symbol: String,
    pub value: f64,
    pub computed_at: DateTime<Utc>,
    pub contributing_source_count: usize,
}

/// One value returned by one source within a cycle.
#[derive(Clone, Debug)]
pub struct SourceSample {
    pub source_name: String,
    pub value: f64,
    pub weight: f64,
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}
