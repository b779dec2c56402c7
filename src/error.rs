use thiserror::Error;
use crate::types::ids::TriggerId;

#[derive(Error, Debug)]
pub enum Error {
    // Price Aggregation Errors
    #[error("Source {source_name} timed out after {timeout_ms}ms")]
    SourceTimeout {
        source_name: String,
        timeout_ms: u64,
    },

    #[error("Source {source_name} failed: {reason}")]
    SourceFailed {
        source_name: String,
        reason: String,
    },

    #[error("Insufficient quorum for {symbol}: need at least {required}, got {valid}")]
    InsufficientQuorum {
        symbol: String,
        valid: usize,
        required: usize,
    },

    #[error("Unsupported symbol: {0}")]
    UnsupportedSymbol(String),

    #[error("Max price feeds exceeded: limit is {max}")]
    MaxFeedsExceeded { max: usize },

    // Trigger Registry Errors
    #[error("Duplicate trigger ID: {0}")]
    DuplicateId(TriggerId),

    #[error("Trigger not found: {0}")]
    NotFound(TriggerId),

    #[error("Invalid schedule '{expression}': {reason}")]
    InvalidSchedule {
        expression: String,
        reason: String,
    },

    #[error("Invalid condition '{condition}': {reason}")]
    InvalidCondition {
        condition: String,
        reason: String,
    },

    // Dispatch Errors
    #[error("Function execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Function execution timed out after {timeout_ms}ms")]
    ExecutionTimeout { timeout_ms: u64 },

    #[error("Dispatch queue full")]
    DispatchQueueFull,

    // System Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
