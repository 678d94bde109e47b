//! Pipeline error taxonomy.

use axum::http::StatusCode;
use thiserror::Error;

use crate::relay::envelope::OutboundResponse;
use crate::relay::translator;

/// Terminal failures raised by pipeline stages.
///
/// The `Display` text of each variant is exactly what the caller sees in the
/// `{"error": ...}` body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Method outside GET, HEAD and OPTIONS.
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    /// The `url` query parameter is absent.
    #[error("Missing url parameter")]
    MissingParameter,

    /// Malformed base64, non UTF-8 text, or not an absolute URL.
    #[error("Invalid url parameter")]
    InvalidEncoding,

    /// Decoded URL has a scheme other than http or https.
    #[error("Only http/https protocols are supported")]
    UnsupportedScheme(String),

    /// Malformed base64 or JSON in the `h` query parameter.
    #[error("Invalid h parameter")]
    InvalidHeaderPayload,

    /// Transport-level failure talking to the target.
    #[error("Upstream request failed: {0}")]
    UpstreamUnreachable(String),

    /// Inbound body exceeded the configured ceiling.
    #[error("Request body too large")]
    PayloadTooLarge,
}

impl RelayError {
    /// HTTP status this error is surfaced as.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::MissingParameter
            | RelayError::InvalidEncoding
            | RelayError::UnsupportedScheme(_)
            | RelayError::InvalidHeaderPayload => StatusCode::BAD_REQUEST,
            RelayError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            RelayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Build the caller-facing response for this error.
    ///
    /// 405 carries an `Allow` header and no body; everything else carries a
    /// JSON error object.
    pub fn into_response(self) -> OutboundResponse {
        match self {
            RelayError::MethodNotAllowed(_) => translator::method_not_allowed(),
            other => translator::json_error(other.status(), &other.to_string()),
        }
    }

    /// Flatten an error and its sources into a single line.
    pub(crate) fn upstream(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        RelayError::UpstreamUnreachable(message)
    }
}

impl From<RelayError> for OutboundResponse {
    fn from(err: RelayError) -> Self {
        err.into_response()
    }
}
