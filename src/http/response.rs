//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn an `OutboundResponse` envelope into a wire response
//! - Stream upstream bodies when streaming mode is enabled
//!
//! # Design Decisions
//! - The envelope's base64 framing is undone here: raw bytes go on the wire
//! - Buffered bodies get an exact `Content-Length`
//! - HEAD, preflight and rejected requests always take the buffered path

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::Response;
use futures_util::TryStreamExt;

use crate::relay::forwarder::from_header_map;
use crate::relay::translator;
use crate::relay::{Dispatch, HttpUpstream, InboundRequest, OutboundResponse, Relay, ResponseBody};

fn build(status: u16, headers: &BTreeMap<String, String>, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);

    let wire = response.headers_mut();
    for (name, value) in headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                wire.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping response header that is not valid on the wire"),
        }
    }
    response
}

/// Wire form of a buffered envelope.
pub fn into_http_response(outbound: OutboundResponse) -> Response {
    let OutboundResponse {
        status_code,
        headers,
        body,
    } = outbound;

    let has_body = !matches!(body, ResponseBody::Empty);
    let bytes = body.into_bytes();
    let length = bytes.len();

    let mut response = build(status_code, &headers, Body::from(bytes));
    if has_body {
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    response
}

/// Relay a GET with the upstream body streamed straight through.
pub async fn stream_response(relay: &Relay<HttpUpstream>, inbound: &InboundRequest) -> Response {
    let request = match relay.prepare(inbound) {
        Ok(Dispatch::Forward(request)) if request.method != Method::HEAD => request,
        _ => return into_http_response(relay.handle(inbound).await),
    };

    let requested_url = request.url.to_string();
    let upstream = match relay.upstream().send(request).await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::warn!(url = %requested_url, error = %e, "Upstream unreachable");
            return into_http_response(e.into_response());
        }
    };

    let status = upstream.status().as_u16();
    let headers = translator::response_headers(
        &from_header_map(upstream.headers()),
        upstream.url().as_str(),
    );
    tracing::debug!(status, url = %requested_url, "Streaming upstream body");

    let stream = upstream.bytes_stream().map_err(std::io::Error::other);
    build(status, &headers, Body::from_stream(stream))
}
