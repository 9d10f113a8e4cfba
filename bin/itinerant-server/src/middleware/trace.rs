use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::BodyExt;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// JSON bodies under this size are logged verbatim.
const BODY_LOG_LIMIT: usize = 1024;

/// Run every request inside an `http_request` span keyed by a trace id taken
/// from `x-trace-id` or freshly generated, and echo the id on the response.
pub async fn trace_middleware(req: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");
        let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

        let (parts, body) = req.into_parts();
        let req_bytes = buffer_and_log("request", &parts.headers, body).await;
        let mut req = Request::from_parts(parts, Body::from(req_bytes));
        if let Some(value) = &header_value {
            req.headers_mut().insert(X_TRACE_ID, value.clone());
        }

        let response = next.run(req).await;

        let (parts, body) = response.into_parts();
        let res_bytes = buffer_and_log("response", &parts.headers, body).await;
        let mut response = Response::from_parts(parts, Body::from(res_bytes));
        if let Some(value) = header_value {
            response.headers_mut().insert(X_TRACE_ID, value);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response finished"
        );
        response
    }
    .instrument(span)
    .await
}

/// Collect a body, logging it when it is small JSON and summarising it
/// otherwise.
async fn buffer_and_log(direction: &str, headers: &header::HeaderMap, body: Body) -> Bytes {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let is_json = content_type.contains("application/json");

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Bytes::new(),
    };

    if is_json && bytes.len() < BODY_LOG_LIMIT {
        if let Ok(text) = std::str::from_utf8(&bytes) {
            info!("{direction} body: {text}");
        }
    } else if !bytes.is_empty() {
        info!(
            "{direction} body: [skipped: type={content_type}, size={}]",
            bytes.len()
        );
    }
    bytes
}
