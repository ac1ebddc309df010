//! urna-daemon - Election Admin Panel Daemon Library
//!
//! The panel is a thin orchestration layer in front of the remote
//! voting/election REST API: a declarative route table proxies CRUD
//! operations upstream, the sealed-election gate middleware short-circuits
//! disallowed mutations, and the report scheduler runs on its own task.
//!
//! # Modules
//!
//! - [`gate_layer`]: request-interception layer enforcing the sealed gate
//! - [`report_export`]: on-demand audit-log PDF export
//! - [`routes`]: route table, generic upstream proxy and router assembly

use std::sync::Arc;

use urna_core::gate::SealGate;

pub mod gate_layer;
pub mod report_export;
pub mod routes;

/// Shared state for every panel handler.
#[derive(Clone)]
pub struct AppState {
    /// Sealed-election authority (owns its own service-identity client).
    pub gate: Arc<SealGate>,
    /// Plain HTTP client for the CRUD proxy (caller identity passthrough).
    pub http: reqwest::Client,
    /// Upstream API base URL, no trailing slash.
    pub upstream_base: String,
}

impl AppState {
    /// Creates the shared state, normalising the upstream base URL.
    #[must_use]
    pub fn new(gate: Arc<SealGate>, http: reqwest::Client, upstream_base: impl Into<String>) -> Self {
        Self {
            gate,
            http,
            upstream_base: upstream_base.into().trim_end_matches('/').to_string(),
        }
    }
}
