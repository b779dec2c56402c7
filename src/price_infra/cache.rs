use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::price_infra::{normalize_symbol, AggregatedPrice};

/// Latest accepted price per symbol. Entries are only ever replaced whole.
#[derive(Clone, Default)]
pub struct PriceCache {
    prices: Arc<RwLock<HashMap<String, AggregatedPrice>>>,
}

impl PriceCache {
    pub fn new() -> Self {
        PriceCache::default()
    }

    /// Consistent snapshot of every cached symbol, taken under one read lock.
    pub async fn get_all_prices(&self) -> HashMap<String, AggregatedPrice> {
        self.prices.read().await.clone()
    }

    pub async fn get_price(&self, symbol: &str) -> Option<AggregatedPrice> {
        self.prices.read().await.get(&normalize_symbol(symbol)).cloned()
    }

    pub(crate) async fn publish(&self, price: AggregatedPrice) {
        let mut prices = self.prices.write().await;
        prices.insert(price.symbol.clone(), price);
    }

    pub(crate) async fn remove(&self, symbol: &str) -> Option<AggregatedPrice> {
        self.prices.write().await.remove(symbol)
    }
}

#[cfg(test)]
impl PriceCache {
    /// Seeds a value directly, bypassing aggregation.
    pub async fn insert_for_test(&self, symbol: &str, value: f64) {
        self.publish(AggregatedPrice {
            symbol: normalize_symbol(symbol),
            value,
            computed_at: chrono::Utc::now(),
            contributing_source_count: 3,
        })
        .await;
    }
}
