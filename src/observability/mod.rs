//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline and HTTP adapter produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID (`x-request-id`) is recorded on every request span
//!   (`http::server` builds the span after `SetRequestIdLayer` runs)
//! - Metrics are cheap and off by default

pub mod logging;
pub mod metrics;
