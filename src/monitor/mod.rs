pub mod price_monitor;

pub use price_monitor::PriceMonitor;
