//! Checkout bridge HTTP server.
//!
//! Wires the lifecycle core (`paybridge`) and the HTTP collaborators
//! (`paybridge-gateway`) into an Axum application: checkout form intake,
//! the gateway's confirmation webhook, client status polling, and a
//! liveness endpoint.
//!
//! # Modules
//!
//! - [`handlers`] — Axum route handlers, shared state, and router builder
//! - [`error`] — HTTP mapping of the core error taxonomy
//! - [`config`] — TOML configuration with environment variable expansion

pub mod config;
pub mod error;
pub mod handlers;

pub use config::BridgeConfig;
pub use handlers::{AppState, bridge_router};
