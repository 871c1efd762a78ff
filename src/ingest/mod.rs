pub mod service;
pub mod summarizer;

pub use service::{IngestResult, IngestionService, MAX_BATCH_BYTES};
pub use summarizer::BatchSummarizer;
