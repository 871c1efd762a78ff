use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use thiserror::Error;

use crate::metrics::METRIC_PARTIAL_INSIGHT_PUBLISHED_TOTAL;
use crate::model::{BatchSummary, PartialInsightEvent};
use crate::stream::queue::{PartitionedQueue, QueueError};
use crate::stream::STREAM_PARTIAL_INSIGHT;

#[derive(Debug, Error)]
pub enum ProduceError {
    // Window keys come from the summarizer in RFC3339 form; a parse failure
    // here is an internal bug, not bad input.
    #[error("invalid window key {key:?}: {source}")]
    WindowKey {
        key: String,
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Turns a batch summary into partial-insight events on the queue.
///
/// Partition key choice is the correctness keystone: the bucket id depends
/// only on the window's minute-of-hour (or hour-of-day) and the window
/// size, so two partial insights targeting the same `(customer, window
/// start, window size)` always share a bucket id and therefore a lane.
/// Unrelated aggregates may share that lane too; that is fine, because the
/// aggregation service keys by the full identity tuple. What the routing
/// buys is the guarantee that no two workers ever touch the same stored
/// aggregate concurrently.
///
/// A publish into a full lane blocks until the lane has room. Cancellation
/// is structural: dropping the calling future abandons the pending publish.
pub struct PartialInsightProducer {
    queue: Arc<PartitionedQueue<PartialInsightEvent>>,
}

impl PartialInsightProducer {
    pub fn new(queue: Arc<PartitionedQueue<PartialInsightEvent>>) -> Self {
        Self { queue }
    }

    /// Publishes one event per window in the summary, in window-key order.
    pub async fn produce(&self, summary: &BatchSummary) -> Result<(), ProduceError> {
        for (window_key, aggregates) in &summary.by_window_start {
            let window_start: DateTime<Utc> = DateTime::parse_from_rfc3339(window_key)
                .map_err(|source| ProduceError::WindowKey {
                    key: window_key.clone(),
                    source,
                })?
                .with_timezone(&Utc);

            let event = PartialInsightEvent {
                customer_id: summary.customer_id.clone(),
                batch_id: summary.batch_id.clone(),
                window_start,
                window_size: summary.window_size,
                requests_by_path: aggregates.requests_by_path.clone(),
                requests_by_user_agent: aggregates.requests_by_user_agent.clone(),
            };
            let partition_key = event.window_size.bucket_id(event.window_start);

            self.queue.publish(&partition_key, event).await?;
            counter!(
                METRIC_PARTIAL_INSIGHT_PUBLISHED_TOTAL,
                1,
                "stream_id" => STREAM_PARTIAL_INSIGHT
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{WindowAggregates, WindowSize};
    use crate::stream::queue::partition_index;
    use std::collections::BTreeMap;

    fn make_summary(window_keys: &[&str]) -> BatchSummary {
        let mut by_window_start = BTreeMap::new();
        for key in window_keys {
            let mut aggregates = WindowAggregates::default();
            aggregates
                .requests_by_path
                .insert("GET /".to_string(), 1);
            aggregates
                .requests_by_user_agent
                .insert("Chrome".to_string(), 1);
            by_window_start.insert(key.to_string(), aggregates);
        }
        BatchSummary {
            batch_id: "batch-0001".to_string(),
            customer_id: "cus-axon".to_string(),
            window_size: WindowSize::Minute,
            by_window_start,
        }
    }

    #[tokio::test]
    async fn test_produce_emits_one_event_per_window() {
        let (queue, mut receivers) = PartitionedQueue::bounded(8, 16);
        let producer = PartialInsightProducer::new(Arc::new(queue));

        producer
            .produce(&make_summary(&[
                "2025-12-28T18:03:00+00:00",
                "2025-12-28T18:04:00+00:00",
            ]))
            .await
            .unwrap();

        let lane_03 = partition_index("minute-03", 8);
        let event = receivers[lane_03].try_recv().unwrap();
        assert_eq!(event.customer_id, "cus-axon");
        assert_eq!(event.window_size, WindowSize::Minute);
        assert_eq!(event.window_start.to_rfc3339(), "2025-12-28T18:03:00+00:00");
        assert_eq!(event.requests_by_path["GET /"], 1);

        let lane_04 = partition_index("minute-04", 8);
        let event = receivers[lane_04].try_recv().unwrap();
        assert_eq!(event.window_start.to_rfc3339(), "2025-12-28T18:04:00+00:00");
    }

    #[tokio::test]
    async fn test_produce_routes_same_window_to_same_lane() {
        let (queue, mut receivers) = PartitionedQueue::bounded(8, 16);
        let producer = PartialInsightProducer::new(Arc::new(queue));

        for _ in 0..3 {
            producer
                .produce(&make_summary(&["2025-12-28T18:03:00+00:00"]))
                .await
                .unwrap();
        }

        let lane = partition_index("minute-03", 8);
        for _ in 0..3 {
            assert!(receivers[lane].try_recv().is_ok());
        }
        for (i, rx) in receivers.iter_mut().enumerate() {
            if i != lane {
                assert!(rx.try_recv().is_err(), "lane {} should be empty", i);
            }
        }
    }

    #[tokio::test]
    async fn test_produce_fails_on_malformed_window_key() {
        let (queue, _receivers) = PartitionedQueue::bounded(8, 16);
        let producer = PartialInsightProducer::new(Arc::new(queue));

        let err = producer
            .produce(&make_summary(&["not-a-timestamp"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProduceError::WindowKey { .. }));
    }
}
