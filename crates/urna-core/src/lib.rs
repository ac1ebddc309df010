//! urna-core - Election Admin Panel Core Library
//!
//! This library holds everything the panel daemon shares between its HTTP
//! surface and its background worker: the typed client for the remote
//! voting/election REST API, the sealed-election authorization gate, the
//! zero/final report document pipeline, and the report scheduler that
//! drives it.
//!
//! The remote API is the source of truth for all entity data; nothing in
//! this crate persists election state locally (the optional
//! [`scheduler::ProcessedMarkerStore`] only remembers which report
//! pipelines already ran).
//!
//! # Modules
//!
//! - [`clock`]: Injectable time source shared by the gate, the service
//!   session and the scheduler
//! - [`config`]: TOML panel configuration with fail-closed startup
//!   validation
//! - [`client`]: `ElectionApi` trait, wire types, reqwest implementation
//!   and a programmable mock for tests
//! - [`gate`]: Sealed-election gate (TTL-cached sealed-state authority and
//!   the sealed-mode action policy)
//! - [`report`]: Report document assembly, PDF rendering and admin
//!   notification emails
//! - [`scheduler`]: Recurring zero-report / final-report worker

pub mod client;
pub mod clock;
pub mod config;
pub mod gate;
pub mod report;
pub mod scheduler;
