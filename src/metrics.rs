use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// Metric names and label sets are part of the external contract; dashboards
// and alerts key on them.
pub const METRIC_BATCH_INGESTED_TOTAL: &str = "ingestion_batch_ingested_total";
pub const METRIC_PARTIAL_INSIGHT_PUBLISHED_TOTAL: &str = "stream_partial_insight_published_total";
pub const METRIC_PARTIAL_INSIGHT_CONSUMED_TOTAL: &str = "stream_partial_insight_consumed_total";
pub const METRIC_WINDOW_AGGREGATE_CREATED_TOTAL: &str = "aggregation_window_aggregate_created_total";
pub const METRIC_HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency";

pub const LABEL_ERROR_CODE: &str = "error_code";
pub const LABEL_STREAM_ID: &str = "stream_id";
pub const LABEL_BUCKET_ID: &str = "bucket_id";

/// Label value used on `error_code` when an operation succeeded.
pub const VALUE_NO_ERROR: &str = "";

/// Latency histogram buckets, in seconds.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Installs the process-wide Prometheus recorder and returns the handle used
/// by `GET /metrics` to render the exposition text.
///
/// Core code only emits named counters through the `metrics` facade; tests
/// run without a recorder installed (emissions become no-ops) or build a
/// local handle via `PrometheusBuilder::build_recorder`.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)?
        .install_recorder()
}
