//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber
//! - Resolve the log filter from `RUST_LOG`, falling back to config
//!
//! # Design Decisions
//! - Human-readable `fmt` output; fields carry the structure
//! - `RUST_LOG` always wins over the configured filter

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` if set and valid, else `fallback`.
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber. Call once, at startup.
pub fn init(fallback_filter: &str) {
    tracing_subscriber::registry()
        .with(env_filter(fallback_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
