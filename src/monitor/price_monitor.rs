use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use crate::dispatch::ActionDispatcher;
use crate::observability::metrics::MONITOR_TICKS;
use crate::price_infra::cache::PriceCache;
use crate::triggers::TriggerRegistry;

/// Polls the price cache on a fixed interval and fires every price alert
/// whose condition holds. Level-triggered: an alert that stays true fires
/// again on every tick.
pub struct PriceMonitor {
    cache: PriceCache,
    registry: TriggerRegistry,
    dispatcher: ActionDispatcher,
    check_interval: Duration,
}

impl PriceMonitor {
    pub fn new(
        cache: PriceCache,
        registry: TriggerRegistry,
        dispatcher: ActionDispatcher,
        check_interval: Duration,
    ) -> Self {
        PriceMonitor {
            cache,
            registry,
            dispatcher,
            check_interval,
        }
    }

    /// One evaluation pass. Returns how many actions were dispatched.
    pub async fn tick(&self) -> usize {
        MONITOR_TICKS.inc();

        let prices = self.cache.get_all_prices().await;
        if prices.is_empty() {
            return 0;
        }

        let dispatcher = &self.dispatcher;
        let fired = self.registry.scan_alerts(&prices, |trigger| {
            if let Some(condition) = trigger.condition() {
                tracing::info!(
                    "Price alert {} matched: {} (owner {})",
                    trigger.id, condition, trigger.owner_id
                );
            }
            dispatcher.dispatch(trigger);
        }).await;

        if fired > 0 {
            tracing::debug!("Price monitor tick fired {} alerts", fired);
        }
        fired
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }

                self.tick().await;
            }

            tracing::info!("Price monitor stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;
    use serde_json::Value;
    use crate::config::DispatchConfig;
    use crate::error::Result;
    use crate::interfaces::function_executor::FunctionExecutor;
    use crate::triggers::{Parameters, TriggerRequest};
    use crate::types::ids::FunctionId;

    #[derive(Default)]
    struct CountingExecutor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FunctionExecutor for CountingExecutor {
        async fn execute(&self, _: &FunctionId, _: &Parameters) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    }

    async fn wait_for_calls(executor: &CountingExecutor, expected: usize) {
        for _ in 0..100 {
            if executor.calls.load(Ordering::SeqCst) >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(executor.calls.load(Ordering::SeqCst), expected);
    }

    fn setup() -> (PriceCache, TriggerRegistry, Arc<CountingExecutor>, PriceMonitor) {
        let cache = PriceCache::new();
        let registry = TriggerRegistry::new();
        let executor = Arc::new(CountingExecutor::default());
        let dispatcher = ActionDispatcher::spawn(executor.clone(), &DispatchConfig::default());
        let monitor = PriceMonitor::new(cache.clone(), registry.clone(), dispatcher, Duration::from_secs(60));
        (cache, registry, executor, monitor)
    }

    #[tokio::test]
    async fn alert_refires_on_every_tick_while_true() {
        let (cache, registry, executor, monitor) = setup();
        registry.create(TriggerRequest::price_alert("g", "alice", "GAS below 5", "fn")).await.unwrap();
        cache.insert_for_test("GAS", 4.2).await;

        assert_eq!(monitor.tick().await, 1);
        assert_eq!(monitor.tick().await, 1);

        wait_for_calls(&executor, 2).await;
    }

    #[tokio::test]
    async fn alert_stops_when_condition_clears() {
        let (cache, registry, executor, monitor) = setup();
        registry.create(TriggerRequest::price_alert("g", "alice", "GAS below 5", "fn")).await.unwrap();

        cache.insert_for_test("GAS", 4.0).await;
        assert_eq!(monitor.tick().await, 1);

        cache.insert_for_test("GAS", 5.5).await;
        assert_eq!(monitor.tick().await, 0);

        wait_for_calls(&executor, 1).await;
    }

    #[tokio::test]
    async fn one_tick_fires_multiple_alerts_for_one_symbol() {
        let (cache, registry, executor, monitor) = setup();
        registry.create(TriggerRequest::price_alert("a", "alice", "NEO above 10", "fn")).await.unwrap();
        registry.create(TriggerRequest::price_alert("b", "alice", "NEO above 11", "fn")).await.unwrap();
        registry.create(TriggerRequest::price_alert("c", "bob", "NEO below 20", "fn")).await.unwrap();
        cache.insert_for_test("NEO", 12.0).await;

        assert_eq!(monitor.tick().await, 3);
        wait_for_calls(&executor, 3).await;
    }

    #[tokio::test]
    async fn deleted_alert_never_fires_again() {
        let (cache, registry, executor, monitor) = setup();
        registry.create(TriggerRequest::price_alert("g", "alice", "GAS below 5", "fn")).await.unwrap();
        cache.insert_for_test("GAS", 1.0).await;

        assert_eq!(monitor.tick().await, 1);
        registry.delete(&"g".into()).await.unwrap();
        assert_eq!(monitor.tick().await, 0);

        wait_for_calls(&executor, 1).await;
    }

    #[tokio::test]
    async fn symbols_without_prices_are_skipped() {
        let (_cache, registry, _executor, monitor) = setup();
        registry.create(TriggerRequest::price_alert("g", "alice", "GAS below 5", "fn")).await.unwrap();
        assert_eq!(monitor.tick().await, 0);
    }
}
