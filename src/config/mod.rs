use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

pub mod loader;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub min_update_interval_secs: u64,
    pub max_update_interval_secs: u64,
    pub max_price_feeds: usize,
    pub min_valid_sources: usize,
    pub default_timeout_ms: u64,
    pub default_weight: f64,
    pub worker_count: usize,
    /// Fractional distance from the cycle median beyond which a sample is an outlier.
    pub deviation_threshold: f64,
    pub supported_symbols: Vec<String>,
    /// Symbols whose aggregation cadence starts at boot.
    pub tracked_symbols: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig {
            min_update_interval_secs: 10,
            max_update_interval_secs: 300,
            max_price_feeds: 100,
            min_valid_sources: 2,
            default_timeout_ms: 5_000,
            default_weight: 1.0,
            worker_count: 10,
            deviation_threshold: 0.10,  // 10%
            supported_symbols: vec![
                "NEO".to_string(),
                "GAS".to_string(),
                "BTC".to_string(),
                "ETH".to_string(),
            ],
            tracked_symbols: Vec::new(),
        }
    }
}

impl AggregatorConfig {
    pub fn min_update_interval(&self) -> Duration {
        Duration::from_secs(self.min_update_interval_secs)
    }

    pub fn max_update_interval(&self) -> Duration {
        Duration::from_secs(self.max_update_interval_secs)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn is_supported(&self, symbol: &str) -> bool {
        self.supported_symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    pub fn validate(&self, source_count: usize) -> Result<()> {
        if self.min_valid_sources == 0 {
            return Err(Error::ConfigError("min_valid_sources must be at least 1".to_string()));
        }
        if self.min_valid_sources > source_count {
            return Err(Error::ConfigError(format!(
                "min_valid_sources ({}) exceeds configured sources ({})",
                self.min_valid_sources, source_count
            )));
        }
        if self.worker_count == 0 {
            return Err(Error::ConfigError("worker_count must be at least 1".to_string()));
        }
        if !(self.default_weight > 0.0) || !self.default_weight.is_finite() {
            return Err(Error::ConfigError("default_weight must be positive".to_string()));
        }
        if !(self.deviation_threshold >= 0.0) {
            return Err(Error::ConfigError("deviation_threshold must not be negative".to_string()));
        }
        if self.min_update_interval_secs == 0 {
            return Err(Error::ConfigError("min_update_interval_secs must be at least 1".to_string()));
        }
        if self.min_update_interval_secs > self.max_update_interval_secs {
            return Err(Error::ConfigError(
                "min_update_interval_secs exceeds max_update_interval_secs".to_string(),
            ));
        }
        if self.tracked_symbols.len() > self.max_price_feeds {
            return Err(Error::MaxFeedsExceeded { max: self.max_price_feeds });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig { interval_secs: 60 }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig { tick_ms: 1_000 }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
    pub worker_count: usize,
    pub execution_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            queue_capacity: 1_024,
            worker_count: 16,
            execution_timeout_secs: 120,
        }
    }
}

impl DispatchConfig {
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            endpoint: "http://127.0.0.1:8090/v1/functions/execute".to_string(),
            request_timeout_secs: 60,
        }
    }
}
