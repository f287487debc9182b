//! HTTP collaborators for the paybridge checkout bridge.
//!
//! Implements the outbound contracts the lifecycle core abstracts behind
//! traits: the mobile-money gateway (client-credentials auth,
//! payment-start, status-lookup) and the push-notification provider.
//!
//! # Modules
//!
//! - [`client`] — [`client::HttpGateway`], the `reqwest`-based
//!   [`paybridge::gateway::Gateway`] implementation
//! - [`alert`] — [`alert::PushSink`], a Pushcut-style
//!   [`paybridge::notify::AlertSink`]

pub mod alert;
pub mod client;

pub use alert::PushSink;
pub use client::{GatewayConfig, HttpGateway};
