//! Upstream forwarding.
//!
//! # Responsibilities
//! - Build the outbound request from the decoded target and assembled headers
//! - Attach a body only for methods that carry one
//! - Follow redirects and report the final URL
//! - Map transport failures to `RelayError::UpstreamUnreachable`
//!
//! # Design Decisions
//! - No retries; the caller owns retry policy
//! - HEAD responses are never read past the headers
//! - HEAD goes through a client with decompression off, so the origin's
//!   `Content-Length` survives
//! - The whole upstream exchange is bounded by `timeouts.upstream_secs`;
//!   expiry is an `UpstreamUnreachable` like any other transport failure
//! - Headers that are not legal on the wire are dropped with a warning rather
//!   than failing the request

use std::future::Future;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use bytes::Bytes;
use reqwest::{redirect, Client};
use url::Url;

use crate::config::schema::{TimeoutConfig, UpstreamConfig};
use crate::relay::codec::decode_base64;
use crate::relay::envelope::InboundRequest;
use crate::relay::error::RelayError;
use crate::relay::headers::HeaderTable;

/// Fully assembled request for the target origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderTable,
    pub body: Option<Bytes>,
}

/// Response received from the target origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderTable,
    /// URL after redirects, when the transport reports one.
    pub url: Option<String>,
    /// `None` when the body was not read (HEAD).
    pub body: Option<Bytes>,
}

/// Transport used to reach the target origin.
pub trait Upstream: Send + Sync {
    fn fetch(
        &self,
        request: UpstreamRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, RelayError>> + Send;
}

/// Body to forward for `method`, decoded from base64 when the adapter
/// flagged it.
pub fn request_body(method: &Method, inbound: &InboundRequest) -> Option<Bytes> {
    if *method == Method::GET || *method == Method::HEAD {
        return None;
    }
    let body = inbound.body.as_ref()?;
    if !inbound.body_is_base64 {
        return Some(body.clone());
    }

    match std::str::from_utf8(body).ok().map(decode_base64) {
        Some(Ok(decoded)) => Some(Bytes::from(decoded)),
        _ => {
            tracing::warn!("Body flagged as base64 did not decode, forwarding verbatim");
            Some(body.clone())
        }
    }
}

/// Convert assembled headers into a wire header map.
pub fn to_header_map(headers: &HeaderTable) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping header that is not valid on the wire"),
        }
    }
    map
}

/// Collect wire headers into a table, joining repeated values.
pub fn from_header_map(headers: &HeaderMap) -> HeaderTable {
    let mut table = HeaderTable::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            table.append(name.as_str(), value);
        }
    }
    table
}

/// `reqwest`-backed upstream transport.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    /// Same policy with content decoding disabled; used for HEAD.
    head_client: Client,
}

impl HttpUpstream {
    /// Build clients that follow at most `max_redirects` redirects and give
    /// up after `upstream_secs`.
    pub fn new(upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let builder = || {
            Client::builder()
                .redirect(redirect::Policy::limited(upstream.max_redirects))
                .connect_timeout(Duration::from_secs(timeouts.connect_secs))
                .timeout(Duration::from_secs(timeouts.upstream_secs))
        };

        let client = builder().build()?;
        let head_client = builder()
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .no_zstd()
            .build()?;
        Ok(Self {
            client,
            head_client,
        })
    }

    /// Send the request and return once headers arrive; the body is left
    /// unread.
    pub async fn send(&self, request: UpstreamRequest) -> Result<reqwest::Response, RelayError> {
        tracing::debug!(method = %request.method, url = %request.url, "Forwarding upstream");

        let client = if request.method == Method::HEAD {
            &self.head_client
        } else {
            &self.client
        };

        let mut builder = client
            .request(request.method, request.url)
            .headers(to_header_map(&request.headers));
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        builder.send().await.map_err(|e| RelayError::upstream(&e))
    }
}

impl Upstream for HttpUpstream {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, RelayError> {
        let is_head = request.method == Method::HEAD;
        let response = self.send(request).await?;

        let status = response.status().as_u16();
        let headers = from_header_map(response.headers());
        let url = Some(response.url().to_string());

        let body = if is_head {
            None
        } else {
            Some(response.bytes().await.map_err(|e| RelayError::upstream(&e))?)
        };

        Ok(UpstreamResponse {
            status,
            headers,
            url,
            body,
        })
    }
}
