use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::debug;

use crate::error::ServiceError;
use crate::metrics::METRIC_WINDOW_AGGREGATE_CREATED_TOTAL;
use crate::model::PartialInsightEvent;
use crate::rollup::merge::rollup;
use crate::storage::AggregateResultStore;

const CODE_AGGREGATE_ROLLUP_FAILED: &str = "AGG_9000";
const CODE_AGGREGATE_STORE_FAILED: &str = "AGG_9001";

/// Seam between the consumer and the rollup logic; lets tests drive the
/// consumer with recording or faulty aggregators.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn aggregate(&self, event: &PartialInsightEvent) -> Result<(), ServiceError>;
}

/// Read-merge-write of one partial insight into its stored window aggregate.
///
/// Correctness under concurrency comes from the queue's routing discipline:
/// all events for one aggregate identity share a lane and therefore a single
/// worker, so this read-modify-write never races with itself.
pub struct AggregationService {
    store: Arc<AggregateResultStore>,
}

impl AggregationService {
    pub fn new(store: Arc<AggregateResultStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Aggregator for AggregationService {
    async fn aggregate(&self, event: &PartialInsightEvent) -> Result<(), ServiceError> {
        debug!(
            customer_id = %event.customer_id,
            batch_id = %event.batch_id,
            bucket_id = %event.window_size.bucket_id(event.window_start),
            "Rolling up partial insight"
        );

        let mut aggregate = self
            .store
            .get(&event.customer_id, event.window_start, event.window_size)
            .await
            .map_err(|e| ServiceError::internal(CODE_AGGREGATE_STORE_FAILED, e))?;
        let is_new = aggregate.is_new();

        rollup(&mut aggregate, event)
            .map_err(|e| ServiceError::internal(CODE_AGGREGATE_ROLLUP_FAILED, e))?;

        self.store
            .upsert(&aggregate)
            .await
            .map_err(|e| ServiceError::internal(CODE_AGGREGATE_STORE_FAILED, e))?;

        if is_new {
            let bucket_id = event.window_size.bucket_id(event.window_start);
            counter!(
                METRIC_WINDOW_AGGREGATE_CREATED_TOTAL,
                1,
                "bucket_id" => bucket_id
            );
        }

        Ok(())
    }
}
