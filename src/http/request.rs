//! Inbound request handling.
//!
//! # Responsibilities
//! - Read the request ID assigned by `SetRequestIdLayer`
//! - Convert an axum request into the pipeline's `InboundRequest`
//! - Enforce the inbound body ceiling while buffering
//!
//! # Design Decisions
//! - Query parameters are form-decoded here; base64 leniency lives in the
//!   pipeline
//! - Repeated headers are joined with `, `

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{HeaderMap, Request, Uri};

use crate::relay::forwarder::from_header_map;
use crate::relay::{InboundRequest, RelayError};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID from headers, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Form-decoded query parameters. Later duplicates win.
pub fn query_params(uri: &Uri) -> HashMap<String, String> {
    uri.query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Buffer the request and hand it to the pipeline's envelope.
pub async fn into_inbound(
    request: Request<Body>,
    max_body_size: usize,
) -> Result<InboundRequest, RelayError> {
    let (parts, body) = request.into_parts();

    let bytes = axum::body::to_bytes(body, max_body_size)
        .await
        .map_err(|e| {
            tracing::debug!(error = %e, "Failed to read inbound body");
            RelayError::PayloadTooLarge
        })?;

    Ok(InboundRequest {
        method: Some(parts.method.to_string()),
        query: query_params(&parts.uri),
        headers: from_header_map(&parts.headers),
        body: (!bytes.is_empty()).then_some(bytes),
        body_is_base64: false,
    })
}
