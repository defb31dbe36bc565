//! Sandboxed load-generation runtime.
//!
//! This crate provides the core pieces of the load control panel: a single
//! on-demand Docker sandbox in which Apache Bench workers run, a
//! concurrency-safe registry of busy targets, a supervisor that launches and
//! reaps one worker per target, and the axum HTTP API in front of it all.

pub mod api;
pub mod api_types;
pub mod config;
pub mod error;
pub mod registry;
pub mod sandbox;
pub mod supervisor;
pub mod targets;
pub mod util;

pub use error::PanelError;
pub use sandbox::SandboxRecord;
pub use supervisor::{LoadPanel, StartParams};

pub const DEFAULT_SANDBOX_IMAGE: &str = "debian:bookworm-slim";
pub const DEFAULT_SANDBOX_NETWORK: &str = "loadpanel_net";
pub const DEFAULT_REQUESTS: u64 = 100_000;
pub const DEFAULT_CONCURRENCY: u64 = 100;

/// Binary invoked inside the sandbox for each load job.
pub const WORKER_BIN: &str = "ab";
