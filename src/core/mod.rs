pub mod engine;

pub use engine::OracleEngine;
