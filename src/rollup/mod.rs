pub mod merge;
pub mod service;

pub use merge::{rollup, RollupError};
pub use service::{AggregationService, Aggregator};
