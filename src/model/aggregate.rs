use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::window::WindowSize;

/// Persisted per-tenant, per-window rollup of request counts.
///
/// Identified by `(customer_id, window_start, window_size)`; there is at
/// most one stored aggregate per identity. The aggregation service
/// read-modify-writes this record, so all counts only ever grow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowAggregateResult {
    pub customer_id: String,
    pub window_start: DateTime<Utc>,
    pub window_size: WindowSize,
    pub requests_by_path: HashMap<String, i64>,
    pub requests_by_user_agent: HashMap<String, i64>,
}

impl WindowAggregateResult {
    /// An aggregate with the identity fields populated and empty count maps,
    /// used when no aggregate has been stored for the identity yet.
    pub fn new_empty(
        customer_id: impl Into<String>,
        window_start: DateTime<Utc>,
        window_size: WindowSize,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            window_start,
            window_size,
            requests_by_path: HashMap::new(),
            requests_by_user_agent: HashMap::new(),
        }
    }

    /// True when nothing has been rolled up into this aggregate yet.
    pub fn is_new(&self) -> bool {
        self.requests_by_path.is_empty() && self.requests_by_user_agent.is_empty()
    }
}
