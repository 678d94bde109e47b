//! Stage composition.

use crate::relay::classifier::{classify, Classified};
use crate::relay::envelope::{InboundRequest, OutboundResponse};
use crate::relay::error::RelayError;
use crate::relay::forwarder::{request_body, Upstream, UpstreamRequest};
use crate::relay::headers::{assemble, decode_overrides, DEFAULT_USER_AGENT};
use crate::relay::target::DecodedTarget;
use crate::relay::translator;

/// What to do with an inbound request once it has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// OPTIONS: answer locally.
    Preflight,
    /// Send this request upstream.
    Forward(UpstreamRequest),
}

/// The request-translation pipeline over an upstream transport.
#[derive(Debug, Clone)]
pub struct Relay<U> {
    upstream: U,
    user_agent: String,
}

impl<U: Upstream> Relay<U> {
    pub fn new(upstream: U) -> Self {
        Self {
            upstream,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Replace the fallback user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Run the validation stages without touching the network.
    pub fn prepare(&self, inbound: &InboundRequest) -> Result<Dispatch, RelayError> {
        let method = match classify(inbound.method.as_deref())? {
            Classified::Preflight => return Ok(Dispatch::Preflight),
            Classified::Forward(method) => method,
        };

        let target = DecodedTarget::decode(inbound.query_param("url"))?;
        let overrides = decode_overrides(inbound.query_param("h"))?;
        let headers = assemble(overrides, &inbound.headers, &self.user_agent);
        let body = request_body(&method, inbound);

        Ok(Dispatch::Forward(UpstreamRequest {
            method,
            url: target.into_url(),
            headers,
            body,
        }))
    }

    /// Run the whole pipeline. Never fails: every error becomes a response.
    pub async fn handle(&self, inbound: &InboundRequest) -> OutboundResponse {
        let request = match self.prepare(inbound) {
            Ok(Dispatch::Preflight) => return translator::preflight(),
            Ok(Dispatch::Forward(request)) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected inbound request");
                return e.into_response();
            }
        };

        let requested_url = request.url.to_string();
        match self.upstream.fetch(request).await {
            Ok(response) => {
                tracing::debug!(
                    status = response.status,
                    url = %requested_url,
                    "Upstream responded"
                );
                translator::translate(response, &requested_url)
            }
            Err(e) => {
                tracing::warn!(url = %requested_url, error = %e, "Upstream unreachable");
                e.into_response()
            }
        }
    }
}
