use crate::config::*;
use crate::error::{Error, Result};
use crate::price_infra::PriceSourceConfig;
use crate::triggers::TriggerRequest;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_format: LogFormat,
    pub aggregator: AggregatorConfig,
    pub sources: Vec<PriceSourceConfig>,
    pub monitor: MonitorConfig,
    pub scheduler: SchedulerConfig,
    pub dispatch: DispatchConfig,
    pub executor: ExecutorConfig,
    /// Triggers registered at startup.
    pub triggers: Vec<TriggerRequest>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl AppConfig {
    pub fn load(config_dir: &str, env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(&format!("{}/default", config_dir)))
            .add_source(File::with_name(&format!("{}/{}", config_dir, env)).required(false))
            .add_source(Environment::with_prefix("ORACLE").separator("__"))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let app: AppConfig = toml::from_str(s)
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        self.aggregator.validate(self.sources.len())?;
        for source in &self.sources {
            source.validate()?;
        }
        if self.monitor.interval_secs == 0 {
            return Err(Error::ConfigError("monitor.interval_secs must be positive".to_string()));
        }
        if self.scheduler.tick_ms == 0 {
            return Err(Error::ConfigError("scheduler.tick_ms must be positive".to_string()));
        }
        if self.dispatch.queue_capacity == 0 || self.dispatch.worker_count == 0 {
            return Err(Error::ConfigError(
                "dispatch.queue_capacity and dispatch.worker_count must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
