use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::counter;
use tracing::debug;
use ulid::Ulid;

use crate::error::ServiceError;
use crate::ingest::summarizer::BatchSummarizer;
use crate::metrics::METRIC_BATCH_INGESTED_TOTAL;
use crate::model::{LogBatch, LogEntry};
use crate::storage::{BatchStoreError, LogBatchStore};
use crate::stream::PartialInsightProducer;

/// Largest accepted request body. The HTTP layer reads at most one byte
/// beyond this so oversized bodies are detected without buffering them.
pub const MAX_BATCH_BYTES: usize = 2 * 1024 * 1024;
const MAX_PATH_LEN: usize = 2048;
const MAX_USER_AGENT_LEN: usize = 1024;

const FORMAT_JSON: &str = "json";

const CODE_VALIDATION_FAILED: &str = "ING_1000";
const CODE_BATCH_ALREADY_PROCESSED: &str = "ING_1001";
const CODE_BATCH_STORE_FAILED: &str = "ING_9000";
const CODE_PRODUCER_FAILED: &str = "ING_9001";

fn validation_failed(message: impl Into<String>) -> ServiceError {
    ServiceError::invalid_argument(CODE_VALIDATION_FAILED, message)
}

#[derive(Debug, Clone)]
pub struct IngestResult {
    pub batch_id: String,
}

/// Admits log batches: validate, deduplicate, persist, summarize, produce.
///
/// Admission is idempotent on `(customer_id, batch_id)`: the batch store's
/// create-if-not-exists put is the only synchronization, so concurrent
/// duplicate submissions resolve to one stored batch and one conflict.
/// A produce failure after the batch is stored is surfaced as internal but
/// the batch is not rolled back; a retry with the same key then conflicts
/// without re-emitting events.
pub struct IngestionService {
    summarizer: BatchSummarizer,
    batch_store: LogBatchStore,
    producer: PartialInsightProducer,
}

impl IngestionService {
    pub fn new(
        summarizer: BatchSummarizer,
        batch_store: LogBatchStore,
        producer: PartialInsightProducer,
    ) -> Self {
        Self {
            summarizer,
            batch_store,
            producer,
        }
    }

    pub async fn ingest_batch(
        &self,
        customer_id: &str,
        idempotency_key: &str,
        format: &str,
        body: &[u8],
    ) -> Result<IngestResult, ServiceError> {
        let result = self
            .ingest_inner(customer_id, idempotency_key, format, body)
            .await;

        let error_code = result.as_ref().err().map(|e| e.code).unwrap_or("");
        counter!(METRIC_BATCH_INGESTED_TOTAL, 1, "error_code" => error_code);

        result
    }

    async fn ingest_inner(
        &self,
        customer_id: &str,
        idempotency_key: &str,
        format: &str,
        body: &[u8],
    ) -> Result<IngestResult, ServiceError> {
        debug!(
            customer_id = %customer_id,
            idempotency_key = %idempotency_key,
            format = %format,
            "Ingesting batch"
        );

        let entries = validate_batch(customer_id, format, body)?;

        let trimmed_key = idempotency_key.trim();
        let batch_id = if trimmed_key.is_empty() {
            Ulid::new().to_string()
        } else {
            trimmed_key.to_string()
        };

        let batch = LogBatch {
            batch_id,
            customer_id: customer_id.to_string(),
            entries,
        };

        match self.batch_store.put(&batch).await {
            Ok(()) => {}
            Err(err @ BatchStoreError::AlreadyExists) => {
                return Err(ServiceError::resource_conflict(
                    CODE_BATCH_ALREADY_PROCESSED,
                    "log batch already processed",
                    err,
                ));
            }
            Err(err) => return Err(ServiceError::internal(CODE_BATCH_STORE_FAILED, err)),
        }

        let summary = self.summarizer.summarize(&batch);
        self.producer
            .produce(&summary)
            .await
            .map_err(|e| ServiceError::internal(CODE_PRODUCER_FAILED, e))?;

        Ok(IngestResult {
            batch_id: batch.batch_id,
        })
    }
}

fn validate_batch(
    customer_id: &str,
    format: &str,
    body: &[u8],
) -> Result<Vec<LogEntry>, ServiceError> {
    if customer_id.is_empty() {
        return Err(validation_failed("customerId is required"));
    }
    if body.len() > MAX_BATCH_BYTES {
        return Err(validation_failed("batch too large: must be <= 2MiB"));
    }
    if !format.to_lowercase().contains(FORMAT_JSON) {
        return Err(validation_failed(format!(
            "unsupported input format: {:?}",
            format
        )));
    }

    let items: Vec<serde_json::Value> =
        serde_json::from_slice(body).map_err(|_| validation_failed("invalid json"))?;
    if items.is_empty() {
        return Err(validation_failed("log entries cannot be empty"));
    }

    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        entries.push(entry_from_json(item, index)?);
    }
    Ok(entries)
}

/// Second decode stage: generic JSON object to a typed entry with explicit
/// per-field missing / wrong-type errors.
fn entry_from_json(value: &serde_json::Value, index: usize) -> Result<LogEntry, ServiceError> {
    let object = value
        .as_object()
        .ok_or_else(|| validation_failed(format!("item at index {}: must be a json object", index)))?;

    let received_at_raw = string_field(object, "receivedAt", index)?;
    let received_at = parse_received_at(received_at_raw).map_err(|_| {
        validation_failed(format!(
            "item at index {}: invalid time format: {}",
            index, received_at_raw
        ))
    })?;

    let method = string_field(object, "method", index)?;
    let path = string_field(object, "path", index)?;
    let user_agent = string_field(object, "userAgent", index)?;

    let entry = LogEntry {
        received_at,
        method: method.trim().to_uppercase(),
        path: path.trim().to_string(),
        user_agent: user_agent.trim().to_string(),
    };

    if entry.path.len() > MAX_PATH_LEN {
        return Err(validation_failed(format!(
            "item at index {}: path too long: max {} characters",
            index, MAX_PATH_LEN
        )));
    }
    if entry.user_agent.len() > MAX_USER_AGENT_LEN {
        return Err(validation_failed(format!(
            "item at index {}: userAgent too long: max {} characters",
            index, MAX_USER_AGENT_LEN
        )));
    }

    Ok(entry)
}

fn string_field<'a>(
    object: &'a serde_json::Map<String, serde_json::Value>,
    field: &str,
    index: usize,
) -> Result<&'a str, ServiceError> {
    match object.get(field) {
        None => Err(validation_failed(format!(
            "item at index {}: missing {}",
            index, field
        ))),
        Some(value) => value.as_str().ok_or_else(|| {
            validation_failed(format!(
                "item at index {}: {} must be a string",
                index, field
            ))
        }),
    }
}

/// Parses a timestamp by trying a small ordered set of formats: ISO-8601
/// with milliseconds and a literal `Z`, then RFC3339 with `Z` or a numeric
/// offset. A datetime without a timezone is rejected.
fn parse_received_at(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3fZ")
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc)))
}
