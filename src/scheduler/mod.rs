pub mod expression;
pub mod runner;

pub use runner::{CronEvaluator, ScheduleRunner};
