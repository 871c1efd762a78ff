use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{WindowAggregateResult, WindowSize};
use crate::storage::file_store::{FileStore, FileStoreError, PutOptions};

const AGGREGATE_RESULT_DIR: &str = "aggregate-results";

#[derive(Debug, Error)]
pub enum AggregateStoreError {
    #[error("failed to encode aggregate result: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode aggregate result: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to access aggregate result: {0}")]
    Store(#[source] FileStoreError),
}

/// Persists window aggregates keyed by `(customer_id, window_start_key)`.
///
/// `get` never reports a miss: a missing aggregate comes back as an empty
/// one carrying the requested identity, so the rollup path is a plain
/// read-modify-write regardless of whether the window exists yet.
pub struct AggregateResultStore {
    store: Arc<dyn FileStore>,
}

impl AggregateResultStore {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, aggregate: &WindowAggregateResult) -> Result<(), AggregateStoreError> {
        let data = serde_json::to_vec(aggregate).map_err(AggregateStoreError::Encode)?;
        let key = Self::key(
            &aggregate.customer_id,
            aggregate.window_start,
            aggregate.window_size,
        );
        self.store
            .put(
                &key,
                &data,
                PutOptions {
                    allow_overwrite: true,
                },
            )
            .await
            .map_err(AggregateStoreError::Store)
    }

    pub async fn get(
        &self,
        customer_id: &str,
        window_start: DateTime<Utc>,
        window_size: WindowSize,
    ) -> Result<WindowAggregateResult, AggregateStoreError> {
        let key = Self::key(customer_id, window_start, window_size);
        match self.store.get(&key).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(AggregateStoreError::Decode),
            Err(FileStoreError::NotFound) => Ok(WindowAggregateResult::new_empty(
                customer_id,
                window_start,
                window_size,
            )),
            Err(e) => Err(AggregateStoreError::Store(e)),
        }
    }

    fn key(customer_id: &str, window_start: DateTime<Utc>, window_size: WindowSize) -> String {
        format!(
            "{}/{}/{}.json",
            AGGREGATE_RESULT_DIR,
            customer_id,
            window_size.window_start_key(window_start)
        )
    }
}
