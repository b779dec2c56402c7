pub mod error;
pub mod config;
pub mod types;
pub mod events;
pub mod price_infra;
pub mod triggers;
pub mod scheduler;
pub mod monitor;
pub mod dispatch;
pub mod interfaces;
pub mod core;
pub mod observability;
pub mod utils;

// Grace period for background tasks on shutdown
pub const SHUTDOWN_GRACE_SECS: u64 = 30;
