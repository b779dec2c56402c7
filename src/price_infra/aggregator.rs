use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::Utc;
use tokio::sync::{broadcast, watch, RwLock, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::Instrument;
use crate::config::AggregatorConfig;
use crate::error::{Error, Result};
use crate::events::price::{AggregationEvent, CycleOutcome, SourcePrice};
use crate::observability::metrics::{
    AGGREGATED_PRICE, AGGREGATION_CYCLES, AGGREGATION_LATENCY, OUTLIERS_REJECTED, SOURCE_FAILURES,
};
use crate::observability::tracing::trace_aggregation;
use crate::price_infra::cache::PriceCache;
use crate::price_infra::connectors::WeightedSource;
use crate::price_infra::{normalize_symbol, AggregatedPrice, SourceSample};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const MIN_BACKOFF: Duration = Duration::from_secs(1);

/// Result of combining one cycle's samples.
#[derive(Clone, Debug)]
pub struct Combined {
    pub value: f64,
    pub median: f64,
    pub survivors: usize,
    pub outliers: Vec<bool>,
}

pub struct PriceAggregator {
    config: AggregatorConfig,
    sources: Vec<WeightedSource>,
    cache: PriceCache,
    workers: Arc<Semaphore>,
    tracked: RwLock<HashSet<String>>,
    events: broadcast::Sender<AggregationEvent>,
}

impl PriceAggregator {
    pub fn new(
        config: AggregatorConfig,
        sources: Vec<WeightedSource>,
        cache: PriceCache,
    ) -> Result<Self> {
        config.validate(sources.len())?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(PriceAggregator {
            workers: Arc::new(Semaphore::new(config.worker_count)),
            config,
            sources,
            cache,
            tracked: RwLock::new(HashSet::new()),
            events,
        })
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AggregationEvent> {
        self.events.subscribe()
    }

    /// Registers a symbol for recurring aggregation. Returns `false` when it
    /// was already tracked.
    pub async fn track(&self, symbol: &str) -> Result<bool> {
        let symbol = self.check_supported(symbol)?;
        let mut tracked = self.tracked.write().await;

        if tracked.contains(&symbol) {
            return Ok(false);
        }
        if tracked.len() >= self.config.max_price_feeds {
            return Err(Error::MaxFeedsExceeded { max: self.config.max_price_feeds });
        }

        tracked.insert(symbol.clone());
        tracing::info!("Tracking {} ({} feeds)", symbol, tracked.len());
        Ok(true)
    }

    /// Stops tracking a symbol and drops its cached value.
    pub async fn untrack(&self, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        let mut tracked = self.tracked.write().await;
        let removed = tracked.remove(&symbol);
        if removed {
            // Still under the write lock so an in-flight cycle cannot publish after this
            self.cache.remove(&symbol).await;
            tracing::info!("Stopped tracking {}", symbol);
        }
        removed
    }

    pub async fn is_tracked(&self, symbol: &str) -> bool {
        self.tracked.read().await.contains(&normalize_symbol(symbol))
    }

    pub async fn tracked_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<_> = self.tracked.read().await.iter().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Runs one fetch-validate-combine cycle and publishes on success if the
    /// symbol is still tracked. On quorum failure the cached value is left
    /// untouched.
    pub async fn aggregate(&self, symbol: &str) -> Result<AggregatedPrice> {
        let symbol = self.check_supported(symbol)?;
        let span = trace_aggregation(&symbol);

        async {
            let started = Instant::now();

            // Step 1: Fan out to every source through the worker pool
            let (samples, failed_sources) = self.fetch_all(&symbol).await;

            // Step 2: Reject outliers and combine
            let combined = combine(
                &symbol,
                &samples,
                self.config.deviation_threshold,
                self.config.min_valid_sources,
            );

            AGGREGATION_LATENCY.observe(started.elapsed().as_secs_f64());

            let outliers = combined.as_ref()
                .map(|c| c.outliers.clone())
                .unwrap_or_else(|_| vec![false; samples.len()]);
            let rejected = outliers.iter().filter(|o| **o).count();

            let (result, outcome) = match combined {
                Ok(c) => {
                    let price = AggregatedPrice {
                        symbol: symbol.clone(),
                        value: c.value,
                        computed_at: Utc::now(),
                        contributing_source_count: c.survivors,
                    };

                    // Step 3: Replace the cached value whole, holding the
                    // tracked set so `untrack` cannot interleave
                    let tracked = self.tracked.read().await;
                    let outcome = if tracked.contains(&symbol) {
                        self.cache.publish(price.clone()).await;
                        AGGREGATED_PRICE.with_label_values(&[&symbol]).set(c.value);

                        tracing::info!(
                            "Published {} = {:.8} from {} sources ({} outliers, {} failed)",
                            symbol, c.value, c.survivors, rejected, failed_sources.len()
                        );

                        CycleOutcome::Published {
                            value: c.value,
                            contributing_sources: c.survivors,
                        }
                    } else {
                        tracing::info!("Discarded {} = {:.8}: symbol not tracked", symbol, c.value);
                        CycleOutcome::Discarded { value: c.value }
                    };
                    drop(tracked);

                    (Ok(price), outcome)
                }
                Err(e) => {
                    tracing::warn!("Aggregation cycle for {} failed: {}", symbol, e);
                    let outcome = match &e {
                        Error::InsufficientQuorum { valid, required, .. } => {
                            CycleOutcome::InsufficientQuorum { valid: *valid, required: *required }
                        }
                        _ => CycleOutcome::InsufficientQuorum {
                            valid: 0,
                            required: self.config.min_valid_sources,
                        },
                    };
                    (Err(e), outcome)
                }
            };

            AGGREGATION_CYCLES.with_label_values(&[&symbol, outcome.label()]).inc();
            if rejected > 0 {
                OUTLIERS_REJECTED.with_label_values(&[&symbol]).inc_by(rejected as u64);
            }

            let event = AggregationEvent {
                symbol: symbol.clone(),
                outcome,
                source_prices: samples.iter()
                    .zip(outliers.iter())
                    .map(|(s, is_outlier)| SourcePrice {
                        source_name: s.source_name.clone(),
                        price: s.value,
                        weight: s.weight,
                        is_outlier: *is_outlier,
                    })
                    .collect(),
                failed_sources,
                rejected_outliers: rejected,
                emitted_at: Utc::now(),
            };
            // No subscribers is not an error
            let _ = self.events.send(event);

            result
        }
        .instrument(span)
        .await
    }

    /// Spawns the recurring cadence task for one symbol. The loop waits
    /// `MinUpdateInterval` after a published cycle and backs off towards
    /// `MaxUpdateInterval` while cycles keep failing. A cycle in flight when
    /// shutdown is signalled runs to completion.
    pub fn spawn_cadence(
        self: Arc<Self>,
        symbol: String,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let min = self.config.min_update_interval();
            let max = self.config.max_update_interval();
            let mut delay = Duration::ZERO;

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }
                if !self.is_tracked(&symbol).await {
                    tracing::info!("Cadence for {} ended: no longer tracked", symbol);
                    break;
                }

                delay = match self.aggregate(&symbol).await {
                    Ok(_) => min,
                    Err(_) => next_backoff(delay, min, max),
                };
            }

            tracing::debug!("Aggregation cadence for {} stopped", symbol);
        })
    }

    fn check_supported(&self, symbol: &str) -> Result<String> {
        let symbol = normalize_symbol(symbol);
        if !self.config.is_supported(&symbol) {
            return Err(Error::UnsupportedSymbol(symbol));
        }
        Ok(symbol)
    }

    /// Fetches every source once, time-boxed per source. Failures are
    /// recorded and never retried within the cycle.
    async fn fetch_all(&self, symbol: &str) -> (Vec<SourceSample>, Vec<String>) {
        let timeout = self.config.default_timeout();
        let mut set = JoinSet::new();

        for source in &self.sources {
            let provider = source.provider.clone();
            let weight = source.weight;
            let workers = self.workers.clone();
            let symbol = symbol.to_string();

            set.spawn(async move {
                let name = provider.name().to_string();
                let fetched = match workers.acquire_owned().await {
                    Ok(_permit) => {
                        match tokio::time::timeout(timeout, provider.fetch_price(&symbol)).await {
                            Ok(res) => res,
                            Err(_) => Err(Error::SourceTimeout {
                                source_name: name.clone(),
                                timeout_ms: timeout.as_millis() as u64,
                            }),
                        }
                    }
                    Err(_) => Err(Error::SourceFailed {
                        source_name: name.clone(),
                        reason: "worker pool closed".to_string(),
                    }),
                };
                (name, weight, fetched)
            });
        }

        let mut samples = Vec::with_capacity(self.sources.len());
        let mut failed = Vec::new();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, weight, Ok(value))) if value.is_finite() && value > 0.0 => {
                    samples.push(SourceSample { source_name: name, value, weight });
                }
                Ok((name, _, Ok(value))) => {
                    tracing::warn!("Source {} returned unusable value {} for {}", name, value, symbol);
                    SOURCE_FAILURES.with_label_values(&[&name, "invalid_value"]).inc();
                    failed.push(name);
                }
                Ok((name, _, Err(e))) => {
                    let reason = match e {
                        Error::SourceTimeout { .. } => "timeout",
                        _ => "error",
                    };
                    tracing::warn!("Source {} failed for {}: {}", name, symbol, e);
                    SOURCE_FAILURES.with_label_values(&[&name, reason]).inc();
                    failed.push(name);
                }
                Err(e) => {
                    tracing::error!("Source fetch task for {} panicked: {}", symbol, e);
                    SOURCE_FAILURES.with_label_values(&["unknown", "panic"]).inc();
                }
            }
        }

        // Deterministic order for events and logs
        samples.sort_by(|a, b| a.source_name.cmp(&b.source_name));
        failed.sort();

        (samples, failed)
    }
}

/// Median-based outlier rejection followed by a weighted average of the
/// survivors. Fails with `InsufficientQuorum` when fewer than
/// `min_valid_sources` samples survive.
pub fn combine(
    symbol: &str,
    samples: &[SourceSample],
    deviation_threshold: f64,
    min_valid_sources: usize,
) -> Result<Combined> {
    let quorum_error = |valid: usize| Error::InsufficientQuorum {
        symbol: symbol.to_string(),
        valid,
        required: min_valid_sources,
    };

    if samples.is_empty() {
        return Err(quorum_error(0));
    }

    let median = calculate_median(samples);
    let outliers: Vec<bool> = samples.iter()
        .map(|s| relative_deviation(s.value, median) > deviation_threshold)
        .collect();

    let survivors: Vec<&SourceSample> = samples.iter()
        .zip(outliers.iter())
        .filter(|(_, is_outlier)| !**is_outlier)
        .map(|(s, _)| s)
        .collect();

    if survivors.len() < min_valid_sources {
        return Err(quorum_error(survivors.len()));
    }

    let value = weighted_average(&survivors)
        .ok_or_else(|| quorum_error(0))?;

    Ok(Combined {
        value,
        median,
        survivors: survivors.len(),
        outliers,
    })
}

fn calculate_median(samples: &[SourceSample]) -> f64 {
    let mut sorted: Vec<f64> = samples.iter().map(|s| s.value).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn relative_deviation(value: f64, median: f64) -> f64 {
    if median == 0.0 {
        return (value - median).abs();
    }
    (value - median).abs() / median.abs()
}

fn weighted_average(samples: &[&SourceSample]) -> Option<f64> {
    let total_weight: f64 = samples.iter().map(|s| s.weight).sum();
    if !(total_weight > 0.0) {
        return None;
    }
    let weighted_sum: f64 = samples.iter().map(|s| s.value * s.weight).sum();
    Some(weighted_sum / total_weight)
}

fn next_backoff(current: Duration, min: Duration, max: Duration) -> Duration {
    let min = min.max(MIN_BACKOFF);
    let max = max.max(min);
    if current < min {
        return min;
    }
    current.saturating_mul(2).min(max)
}
