//! CORS forwarding relay library.
//!
//! Accepts requests carrying a base64-encoded target URL, replays them
//! against the target with a whitelisted header set, and relays the response
//! back with permissive cross-origin headers.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::{InboundRequest, OutboundResponse, Relay, RelayError};
