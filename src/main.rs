use std::time::Duration;
use anyhow::Context;
use clap::Parser;
use oracle_automation::config::loader::AppConfig;
use oracle_automation::core::OracleEngine;
use oracle_automation::observability::metrics::register_metrics;
use oracle_automation::observability::tracing::init_tracing;
use oracle_automation::SHUTDOWN_GRACE_SECS;

#[derive(Parser, Debug)]
#[command(name = "oracle-automation", about = "Price oracle aggregation and trigger automation")]
struct Args {
    /// Environment overlay loaded after config/default.toml
    #[arg(short, long, default_value = "development")]
    env: String,

    /// Directory holding the configuration files
    #[arg(short, long, default_value = "config")]
    config_dir: String,

    /// Seconds between background task health checks
    #[arg(long, default_value_t = 30)]
    health_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(&args.config_dir, &args.env)
        .context("loading configuration")?;
    init_tracing(config.log_format);
    register_metrics().context("registering metrics")?;

    tracing::info!(
        "Starting with {} sources, {} tracked symbols",
        config.sources.len(),
        config.aggregator.tracked_symbols.len()
    );

    let mut engine = OracleEngine::from_config(&config).context("building engine")?;
    engine.start().await.context("starting engine")?;

    let mut health = tokio::time::interval(Duration::from_secs(args.health_interval));
    loop {
        tokio::select! {
            _ = health.tick() => {
                for task in engine.check_health() {
                    tracing::error!("Background task {} exited unexpectedly", task);
                }
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    engine.shutdown(Duration::from_secs(SHUTDOWN_GRACE_SECS)).await;
    Ok(())
}
