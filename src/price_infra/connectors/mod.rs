pub mod binance;
pub mod coinbase;
pub mod http;

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use crate::error::Result;
use crate::price_infra::PriceSourceConfig;
use self::http::HttpPriceSource;

/// One external price source. Implementations must be cancel-safe: the
/// aggregator drops the future when the per-source timeout elapses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self, symbol: &str) -> Result<f64>;
    fn name(&self) -> &str;
}

/// A source together with the weight it carries in the combined value.
#[derive(Clone)]
pub struct WeightedSource {
    pub provider: Arc<dyn PriceSource>,
    pub weight: f64,
}

impl WeightedSource {
    pub fn new(provider: Arc<dyn PriceSource>, weight: f64) -> Self {
        WeightedSource { provider, weight }
    }
}

/// Builds HTTP sources for every enabled entry, sharing one connection pool.
pub fn build_sources(
    configs: &[PriceSourceConfig],
    default_weight: f64,
    request_timeout: Duration,
) -> Result<Vec<WeightedSource>> {
    let client = reqwest::Client::builder()
        .timeout(request_timeout)
        .build()?;

    let sources = configs.iter()
        .filter(|c| c.enabled)
        .map(|c| {
            let provider: Arc<dyn PriceSource> = Arc::new(HttpPriceSource::new(c, client.clone()));
            WeightedSource::new(provider, c.weight.unwrap_or(default_weight))
        })
        .collect();

    Ok(sources)
}
