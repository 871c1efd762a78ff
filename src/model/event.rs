use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::window::WindowSize;

/// Partial aggregation result for one time window of one batch.
///
/// Produced during batch summarization and consumed by the aggregation
/// service; every event for the same `(customer_id, window_start,
/// window_size)` identity is merged into the same stored aggregate.
/// Immutable from production to consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialInsightEvent {
    pub customer_id: String,
    pub batch_id: String,
    pub window_start: DateTime<Utc>,
    pub window_size: WindowSize,
    pub requests_by_path: HashMap<String, i64>,
    pub requests_by_user_agent: HashMap<String, i64>,
}
