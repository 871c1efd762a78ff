pub mod aggregate;
pub mod batch;
pub mod event;
pub mod summary;
pub mod window;

pub use aggregate::WindowAggregateResult;
pub use batch::{LogBatch, LogEntry};
pub use event::PartialInsightEvent;
pub use summary::{BatchSummary, WindowAggregates};
pub use window::WindowSize;
