use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::window::WindowSize;

/// Per-window request counts inside a batch summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowAggregates {
    pub requests_by_path: HashMap<String, i64>,
    pub requests_by_user_agent: HashMap<String, i64>,
}

/// Reduction of a log batch into compact time-windowed aggregates.
///
/// A batch with hundreds of entries spanning a handful of minute windows
/// becomes one `WindowAggregates` per window, keyed by the RFC3339 form of
/// the UTC-truncated window start. The BTreeMap keeps window keys in
/// lexicographic order so downstream production is deterministic.
///
/// A summary is a pure function of its batch and is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: String,
    pub customer_id: String,
    pub window_size: WindowSize,
    pub by_window_start: BTreeMap<String, WindowAggregates>,
}
