use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use futures::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tracing::error;

use crate::error::ServiceError;
use crate::ingest::{IngestionService, MAX_BATCH_BYTES};
use crate::web::middleware::RequestId;

pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_CUSTOMER_ID: &str = "x-customer-id";
pub const HEADER_IDEMPOTENCY_KEY: &str = "idempotency-key";
pub const HEADER_CONTENT_TYPE: &str = "content-type";

#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<IngestionService>,
    pub metrics: PrometheusHandle,
}

/// Stable error code of a response, stashed in response extensions so the
/// metrics middleware can label with it.
#[derive(Debug, Clone, Copy)]
pub struct ErrorCode(pub &'static str);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub request_id: String,
    pub error_category: String,
    pub error_code: String,
    pub error_description: String,
}

/// `POST /logs`: admit one batch of log entries for the tenant named by
/// `x-customer-id`. Success is 202 with an empty body.
pub async fn ingest_logs(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    request: Request,
) -> Response {
    let customer_id = header_value(request.headers(), HEADER_CUSTOMER_ID);
    let idempotency_key = header_value(request.headers(), HEADER_IDEMPOTENCY_KEY);
    let content_type = header_value(request.headers(), HEADER_CONTENT_TYPE);

    let body = match read_body_limited(request.into_body(), MAX_BATCH_BYTES).await {
        Ok(body) => body,
        Err(err) => return error_response(request_id.as_str(), &err),
    };

    match state
        .ingestion
        .ingest_batch(&customer_id, &idempotency_key, &content_type, &body)
        .await
    {
        Ok(_) => StatusCode::ACCEPTED.into_response(),
        Err(err) => error_response(request_id.as_str(), &err),
    }
}

/// `GET /metrics`: Prometheus exposition text.
pub async fn metrics(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Reads at most `max + 1` bytes of the body; the service rejects anything
/// longer than `max`, so the excess byte only needs to be observed, never
/// buffered in full.
async fn read_body_limited(body: Body, max: usize) -> Result<Vec<u8>, ServiceError> {
    let mut stream = body.into_data_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ServiceError::undefined)?;
        let remaining = (max + 1).saturating_sub(buf.len());
        if chunk.len() >= remaining {
            buf.extend_from_slice(&chunk[..remaining]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf)
}

/// Builds the JSON error body for a failed request and records the error
/// code for the metrics middleware. Internal causes are logged here and
/// never leak to the client.
pub fn error_response(request_id: &str, err: &ServiceError) -> Response {
    if err.is_internal() {
        error!(
            error_code = err.code,
            error = %err,
            cause = ?err.cause,
            "Internal error in handler"
        );
    }

    let body = ErrorResponse {
        request_id: request_id.to_string(),
        error_category: err.category.as_str().to_string(),
        error_code: err.code.to_string(),
        error_description: err.message.clone(),
    };
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = (status, Json(body)).into_response();
    response.extensions_mut().insert(ErrorCode(err.code));
    response
}
