//! Request-translation pipeline.
//!
//! # Data Flow
//! ```text
//! InboundRequest (from the hosting adapter)
//!     → classifier.rs (method policy, OPTIONS preflight short-circuit)
//!     → target.rs     (base64 `url` parameter → DecodedTarget)
//!     → headers.rs    (base64 JSON `h` blob + whitelist passthrough + default UA)
//!     → forwarder.rs  (outbound request, redirects followed)
//!     → translator.rs (CORS, header whitelist, X-Final-Url, base64 body)
//!     → OutboundResponse (back to the hosting adapter)
//! ```
//!
//! # Design Decisions
//! - Every stage is a plain function over request-scoped values; nothing is
//!   retained between requests
//! - Every failure is converted into an `OutboundResponse` before leaving
//!   `Relay::handle`
//! - The upstream client sits behind the `Upstream` trait so the pipeline can
//!   be exercised without a network

pub mod classifier;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod forwarder;
pub mod headers;
pub mod link;
pub mod pipeline;
pub mod target;
pub mod translator;

pub use envelope::{InboundRequest, OutboundResponse, ResponseBody};
pub use error::RelayError;
pub use forwarder::{HttpUpstream, Upstream, UpstreamRequest, UpstreamResponse};
pub use headers::HeaderTable;
pub use pipeline::{Dispatch, Relay};
pub use target::DecodedTarget;
