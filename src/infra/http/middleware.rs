use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use super::error::ErrorReport;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Runs the request inside a span carrying its id, echoes the id back in
/// `x-request-id` and logs failed responses with their [`ErrorReport`].
///
/// A caller-supplied `x-request-id` is kept; otherwise a fresh one is minted.
pub async fn trace_requests(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .filter(|value| !value.is_empty())
        .cloned()
        .unwrap_or_else(fresh_request_id);
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let span = info_span!(
        "http_request",
        request_id = request_id.to_str().unwrap_or(""),
        method = %method,
        path = %uri.path(),
    );

    let mut response = next.run(request).instrument(span.clone()).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let report = response.extensions_mut().remove::<ErrorReport>();
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);

    span.in_scope(|| log_response(status, &uri, elapsed_ms, report));
    response
}

fn log_response(status: StatusCode, uri: &Uri, elapsed_ms: u128, report: Option<ErrorReport>) {
    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target = "notion_feed::http::response",
            status = status.as_u16(),
            elapsed_ms,
            "request served"
        );
        return;
    }

    let (source, messages) = match report {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        error!(
            target = "notion_feed::http::response",
            status = status.as_u16(),
            query = uri.query().unwrap_or(""),
            elapsed_ms,
            source,
            detail = %detail,
            chain = ?messages,
            "request failed",
        );
    } else {
        warn!(
            target = "notion_feed::http::response",
            status = status.as_u16(),
            query = uri.query().unwrap_or(""),
            elapsed_ms,
            source,
            detail = %detail,
            chain = ?messages,
            "client request error",
        );
    }
}

fn fresh_request_id() -> HeaderValue {
    let id = Uuid::new_v4().hyphenated().to_string();
    HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}
