use tracing::Span;
use tracing_subscriber::EnvFilter;
use crate::config::loader::LogFormat;
use crate::types::ids::{FunctionId, TriggerId};

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}

pub fn trace_aggregation(symbol: &str) -> Span {
    tracing::info_span!(
        "aggregation_cycle",
        symbol = %symbol,
    )
}

pub fn trace_dispatch(trigger_id: &TriggerId, function_id: &FunctionId) -> Span {
    tracing::info_span!(
        "dispatch",
        trigger_id = %trigger_id,
        function_id = %function_id,
    )
}
