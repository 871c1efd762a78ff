use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use futures::FutureExt;
use metrics::{counter, histogram};
use tracing::{error, info, Instrument};
use ulid::Ulid;

use crate::error::{panic_message, ServiceError};
use crate::metrics::{METRIC_HTTP_REQUESTS_TOTAL, METRIC_HTTP_REQUEST_LATENCY};
use crate::web::handlers::{error_response, ErrorCode, HEADER_REQUEST_ID};

/// Request id carried through request extensions for handlers and the
/// panic recoverer.
#[derive(Debug, Clone, Default)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Accepts the client's `x-request-id` or mints a ULID, attaches it to the
/// request scope and the tracing span, and echoes it on the response.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Ulid::new().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = axum::http::HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(HEADER_REQUEST_ID, value);
    }
    response
}

/// Records `http_requests_total` and `http_request_latency`, labeled with
/// the route pattern rather than the raw path to keep cardinality bounded.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    let error_code = response
        .extensions()
        .get::<ErrorCode>()
        .map(|code| code.0)
        .unwrap_or("");

    counter!(
        METRIC_HTTP_REQUESTS_TOTAL,
        1,
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone(),
        "error_code" => error_code
    );
    histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        start.elapsed().as_secs_f64(),
        "method" => method,
        "path" => path,
        "status" => status,
        "error_code" => error_code
    );

    response
}

/// Emits one completion log line per request.
pub async fn log_completion(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

/// Traps handler panics and converts them into the fixed panic error
/// response instead of tearing down the connection.
pub async fn recover_panics(request: Request, next: Next) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_default();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let detail = panic_message(payload);
            error!(panic = %detail, "HTTP panic recovered");
            error_response(request_id.as_str(), &ServiceError::panic(detail))
        }
    }
}
