//! Payment transaction lifecycle manager for mobile-money checkouts.
//!
//! This crate implements the stateful core of a checkout bridge sitting
//! between an end-user payment form and a mobile-money gateway (M-Pesa /
//! E-Mola style). A payment is initiated against the gateway, tracked as an
//! in-memory [`transaction::Transaction`], and later resolved to a terminal
//! state by one of two racing confirmation signals: an asynchronous webhook
//! pushed by the gateway, or an active status lookup performed on behalf of
//! a polling client.
//!
//! The gateway and the push-notification provider are abstracted behind the
//! [`gateway::Gateway`] and [`notify::AlertSink`] traits; HTTP
//! implementations live in the `paybridge-gateway` crate.
//!
//! # Modules
//!
//! - [`transaction`] - Transaction records, references, statuses, phone numbers
//! - [`store`] - Concurrent transaction store with atomic status transitions
//! - [`token`] - Cached bearer-credential provider
//! - [`initiator`] - Checkout validation and payment initiation
//! - [`reconciler`] - Webhook and poll paths converging on one state machine
//! - [`notify`] - Best-effort payment alerts
//! - [`gateway`] - Outbound gateway abstraction
//! - [`error`] - Error taxonomy for the whole lifecycle

pub mod error;
pub mod gateway;
pub mod initiator;
pub mod notify;
pub mod reconciler;
pub mod store;
pub mod token;
pub mod transaction;

pub use error::PaymentError;
pub use initiator::{CheckoutRequest, PaymentInitiator};
pub use reconciler::ConfirmationReconciler;
pub use store::TransactionStore;
pub use token::TokenProvider;
pub use transaction::{PaymentMethod, Reference, Transaction, TxStatus};

#[cfg(test)]
pub(crate) mod test_support;
