pub mod consumer;
pub mod producer;
pub mod queue;

pub use consumer::PartialInsightConsumer;
pub use producer::{PartialInsightProducer, ProduceError};
pub use queue::{PartitionedQueue, QueueError, DEFAULT_BUFFER, DEFAULT_PARTITIONS};

/// Stream identifier used on the published/consumed metrics.
pub const STREAM_PARTIAL_INSIGHT: &str = "partial_insight";
