//! Method classification.
//!
//! Only read-only retrieval is relayed. OPTIONS is answered locally as a
//! CORS preflight and never reaches upstream.

use axum::http::Method;

use crate::relay::error::RelayError;

/// Methods accepted by the relay, in `Allow` header order.
pub const ALLOWED_METHODS: &[Method] = &[Method::GET, Method::HEAD, Method::OPTIONS];

/// Value of the `Allow` header on 405 responses.
pub const ALLOW_HEADER_VALUE: &str = "GET,HEAD,OPTIONS";

/// Outcome of classifying an inbound method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// Answer with CORS headers only.
    Preflight,
    /// Continue down the pipeline with this method.
    Forward(Method),
}

/// Classify a raw method string. Absent or blank means GET.
pub fn classify(raw: Option<&str>) -> Result<Classified, RelayError> {
    let name = raw
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("GET")
        .to_ascii_uppercase();

    let method = Method::from_bytes(name.as_bytes())
        .map_err(|_| RelayError::MethodNotAllowed(name.clone()))?;

    if method == Method::OPTIONS {
        return Ok(Classified::Preflight);
    }
    if !ALLOWED_METHODS.contains(&method) {
        return Err(RelayError::MethodNotAllowed(name));
    }
    Ok(Classified::Forward(method))
}
