use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use crate::config::loader::AppConfig;
use crate::dispatch::ActionDispatcher;
use crate::error::Result;
use crate::interfaces::function_executor::{FunctionExecutor, HttpFunctionExecutor};
use crate::monitor::PriceMonitor;
use crate::price_infra::aggregator::PriceAggregator;
use crate::price_infra::cache::PriceCache;
use crate::price_infra::connectors::{build_sources, WeightedSource};
use crate::price_infra::normalize_symbol;
use crate::scheduler::ScheduleRunner;
use crate::triggers::{TriggerRegistry, TriggerRequest};
use crate::utils::task_supervisor::TaskSupervisor;

const MONITOR_TASK: &str = "price_monitor";

fn cadence_task_name(symbol: &str) -> String {
    format!("aggregation:{}", symbol)
}

/// Owns every component and the shutdown signal. Handles returned by
/// `registry()` and `cache()` stay valid after shutdown.
pub struct OracleEngine {
    aggregator: Arc<PriceAggregator>,
    registry: TriggerRegistry,
    dispatcher: ActionDispatcher,
    runner: ScheduleRunner,
    monitor_interval: Duration,
    tracked_at_boot: Vec<String>,
    bootstrap_triggers: Vec<TriggerRequest>,
    shutdown: watch::Sender<bool>,
    supervisor: TaskSupervisor,
}

impl OracleEngine {
    /// Builds the engine with HTTP sources and the HTTP function executor.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let sources = build_sources(
            &config.sources,
            config.aggregator.default_weight,
            config.aggregator.default_timeout(),
        )?;
        let executor = HttpFunctionExecutor::new(
            config.executor.endpoint.clone(),
            Duration::from_secs(config.executor.request_timeout_secs),
        )?;

        OracleEngine::new(config, sources, Arc::new(executor))
    }

    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &AppConfig,
        sources: Vec<WeightedSource>,
        executor: Arc<dyn FunctionExecutor>,
    ) -> Result<Self> {
        let cache = PriceCache::new();
        let aggregator = Arc::new(PriceAggregator::new(config.aggregator.clone(), sources, cache)?);
        let registry = TriggerRegistry::new();
        let dispatcher = ActionDispatcher::spawn(executor, &config.dispatch);
        let runner = ScheduleRunner::new(registry.clone(), dispatcher.clone(), config.scheduler.tick());
        let (shutdown, _) = watch::channel(false);

        Ok(OracleEngine {
            aggregator,
            registry,
            dispatcher,
            runner,
            monitor_interval: config.monitor.interval(),
            tracked_at_boot: config.aggregator.tracked_symbols.clone(),
            bootstrap_triggers: config.triggers.clone(),
            shutdown,
            supervisor: TaskSupervisor::new(),
        })
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &PriceCache {
        self.aggregator.cache()
    }

    pub fn aggregator(&self) -> &Arc<PriceAggregator> {
        &self.aggregator
    }

    /// Registers bootstrap triggers, then starts the aggregation cadences,
    /// the price monitor, and the schedule runner.
    pub async fn start(&mut self) -> Result<()> {
        for request in std::mem::take(&mut self.bootstrap_triggers) {
            self.registry.create(request).await?;
        }

        for symbol in self.tracked_at_boot.clone() {
            self.track_symbol(&symbol).await?;
        }

        let monitor = PriceMonitor::new(
            self.aggregator.cache().clone(),
            self.registry.clone(),
            self.dispatcher.clone(),
            self.monitor_interval,
        );
        self.supervisor.register(MONITOR_TASK, monitor.spawn(self.shutdown.subscribe()));

        self.runner.start().await;

        tracing::info!(
            "Engine started: {} feeds, {} triggers",
            self.aggregator.tracked_symbols().await.len(),
            self.registry.len().await
        );
        Ok(())
    }

    /// Starts aggregating a symbol on its own cadence.
    pub async fn track_symbol(&mut self, symbol: &str) -> Result<()> {
        self.aggregator.track(symbol).await?;

        let symbol = normalize_symbol(symbol);
        let name = cadence_task_name(&symbol);
        if !self.supervisor.contains(&name) {
            let handle = self.aggregator.clone()
                .spawn_cadence(symbol, self.shutdown.subscribe());
            self.supervisor.register(name, handle);
        }
        Ok(())
    }

    /// The symbol's cadence ends at its next wake-up.
    pub async fn untrack_symbol(&mut self, symbol: &str) -> bool {
        self.aggregator.untrack(symbol).await
    }

    /// Names of supervised tasks that have exited since the last check.
    pub fn check_health(&mut self) -> Vec<String> {
        self.supervisor.reap_finished()
    }

    /// Stops the schedule runner and the monitor, lets in-flight aggregation
    /// cycles finish, and waits up to `grace` for background tasks. Actions
    /// already dispatched keep running.
    pub async fn shutdown(mut self, grace: Duration) {
        tracing::info!("Engine shutting down");

        let _ = self.shutdown.send(true);
        self.runner.stop().await;
        self.supervisor.join_all(grace).await;

        tracing::info!("Engine stopped");
    }
}
