use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single parsed HTTP request record. Immutable once parsed; the ingestion
/// service trims and normalizes the fields before constructing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub received_at: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub user_agent: String,
}

/// An admitted batch of log entries for one tenant.
///
/// `batch_id` is the client's idempotency key when supplied, otherwise a
/// freshly generated ULID. The `(customer_id, batch_id)` pair names the
/// batch in the batch store and drives duplicate rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogBatch {
    pub batch_id: String,
    pub customer_id: String,
    pub entries: Vec<LogEntry>,
}
