pub mod aggregate_store;
pub mod batch_store;
pub mod file_store;

pub use aggregate_store::{AggregateResultStore, AggregateStoreError};
pub use batch_store::{BatchStoreError, LogBatchStore};
pub use file_store::{FileStore, FileStoreError, LocalFileStore, PutOptions};
