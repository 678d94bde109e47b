//! Response translation.
//!
//! # Responsibilities
//! - Attach the fixed CORS header set to every response
//! - Copy whitelisted upstream headers, re-cased to Title-Case
//! - Report the post-redirect URL in `X-Final-Url`
//! - Default `Content-Type` and compute `Content-Length` for buffered bodies
//!
//! # Design Decisions
//! - Upstream 4xx/5xx statuses are passed through untouched
//! - Buffered bodies are emitted as binary (base64 in the envelope)

use std::collections::BTreeMap;

use axum::http::StatusCode;

use crate::relay::classifier::ALLOW_HEADER_VALUE;
use crate::relay::envelope::{OutboundResponse, ResponseBody};
use crate::relay::forwarder::UpstreamResponse;
use crate::relay::headers::HeaderTable;

/// Attached to every response.
pub const CORS_HEADERS: &[(&str, &str)] = &[
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", ALLOW_HEADER_VALUE),
    ("Access-Control-Allow-Headers", "*"),
    ("Access-Control-Expose-Headers", "*"),
];

/// Upstream response headers relayed to the caller.
pub const FORWARDED_RESPONSE_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "accept-ranges",
    "content-range",
    "cache-control",
    "etag",
    "last-modified",
    "expires",
];

pub const FINAL_URL_HEADER: &str = "X-Final-Url";

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPE: &str = "Content-Type";
const CONTENT_LENGTH: &str = "Content-Length";

/// `content-type` → `Content-Type`, `etag` → `Etag`.
pub fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

pub fn cors_headers() -> BTreeMap<String, String> {
    CORS_HEADERS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// 204 answer to an OPTIONS preflight.
pub fn preflight() -> OutboundResponse {
    OutboundResponse::new(StatusCode::NO_CONTENT.as_u16(), cors_headers(), ResponseBody::Empty)
}

pub fn method_not_allowed() -> OutboundResponse {
    let mut headers = cors_headers();
    headers.insert("Allow".to_string(), ALLOW_HEADER_VALUE.to_string());
    OutboundResponse::new(
        StatusCode::METHOD_NOT_ALLOWED.as_u16(),
        headers,
        ResponseBody::Empty,
    )
}

/// `{"error": message}` with CORS headers.
pub fn json_error(status: StatusCode, message: &str) -> OutboundResponse {
    let mut headers = cors_headers();
    headers.insert(CONTENT_TYPE.to_string(), "application/json".to_string());
    let body = serde_json::json!({ "error": message }).to_string();
    OutboundResponse::new(status.as_u16(), headers, ResponseBody::Text(body))
}

/// Caller-facing headers for an upstream response, without body-derived
/// fields.
pub fn response_headers(upstream: &HeaderTable, final_url: &str) -> BTreeMap<String, String> {
    let mut headers = cors_headers();

    for name in FORWARDED_RESPONSE_HEADERS {
        if let Some(value) = upstream.get(name) {
            headers.insert(title_case(name), value.to_string());
        }
    }

    headers
        .entry(CONTENT_TYPE.to_string())
        .or_insert_with(|| DEFAULT_CONTENT_TYPE.to_string());
    headers.insert(FINAL_URL_HEADER.to_string(), final_url.to_string());

    headers
}

/// Translate an upstream response. `requested_url` stands in for the final
/// URL when the transport did not report one.
pub fn translate(upstream: UpstreamResponse, requested_url: &str) -> OutboundResponse {
    let final_url = upstream.url.as_deref().unwrap_or(requested_url);
    let mut headers = response_headers(&upstream.headers, final_url);

    let body = match upstream.body {
        None => ResponseBody::Empty,
        Some(bytes) => {
            headers.insert(CONTENT_LENGTH.to_string(), bytes.len().to_string());
            ResponseBody::Binary(bytes)
        }
    };

    OutboundResponse::new(upstream.status, headers, body)
}
