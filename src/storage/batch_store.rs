use std::sync::Arc;

use thiserror::Error;

use crate::model::LogBatch;
use crate::storage::file_store::{FileStore, FileStoreError, PutOptions};

const RAW_BATCH_DIR: &str = "raw-batches";

#[derive(Debug, Error)]
pub enum BatchStoreError {
    #[error("log batch already exists")]
    AlreadyExists,

    #[error("failed to encode log batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to store log batch: {0}")]
    Store(#[source] FileStoreError),
}

/// Persists raw log batches with write-once semantics.
///
/// The no-overwrite put gives idempotent admission: when two requests race
/// on the same `(customer_id, batch_id)`, exactly one batch is stored and
/// the other caller sees `AlreadyExists`.
pub struct LogBatchStore {
    store: Arc<dyn FileStore>,
}

impl LogBatchStore {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    pub async fn put(&self, batch: &LogBatch) -> Result<(), BatchStoreError> {
        let data = serde_json::to_vec(batch)?;
        let key = format!(
            "{}/{}/{}.json",
            RAW_BATCH_DIR, batch.customer_id, batch.batch_id
        );

        match self
            .store
            .put(
                &key,
                &data,
                PutOptions {
                    allow_overwrite: false,
                },
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(FileStoreError::AlreadyExists) => Err(BatchStoreError::AlreadyExists),
            Err(e) => Err(BatchStoreError::Store(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogEntry;
    use crate::storage::file_store::LocalFileStore;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn make_batch(batch_id: &str) -> LogBatch {
        LogBatch {
            batch_id: batch_id.to_string(),
            customer_id: "cus-axon".to_string(),
            entries: vec![LogEntry {
                received_at: Utc.with_ymd_and_hms(2025, 12, 28, 18, 3, 15).unwrap(),
                method: "GET".to_string(),
                path: "/".to_string(),
                user_agent: "curl/7.88.1".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_put_writes_batch_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = LogBatchStore::new(Arc::new(LocalFileStore::new(temp_dir.path()).unwrap()));

        store.put(&make_batch("batch-0001")).await.unwrap();

        let path = temp_dir
            .path()
            .join("raw-batches/cus-axon/batch-0001.json");
        assert!(path.exists());

        let stored: LogBatch =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored.batch_id, "batch-0001");
        assert_eq!(stored.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_put_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = LogBatchStore::new(Arc::new(LocalFileStore::new(temp_dir.path()).unwrap()));
        let batch = make_batch("batch-0001");

        store.put(&batch).await.unwrap();
        assert!(matches!(
            store.put(&batch).await,
            Err(BatchStoreError::AlreadyExists)
        ));
    }
}
