//! Error taxonomy for the payment lifecycle.
//!
//! Every error is scoped to a single operation; nothing here is fatal to the
//! process. Webhook anomalies and notification failures are deliberately not
//! represented: both are swallowed at their call sites (see
//! [`crate::reconciler`] and [`crate::notify`]).

use crate::transaction::Reference;

/// Umbrella error for payment operations.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Bad checkout input. Never retried; surfaced to the caller immediately.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Token acquisition failed after the single internal retry.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Reference collision on insert.
    #[error("{0}")]
    Duplicate(#[from] DuplicateReference),

    /// Payment-start or status-lookup failure. Does not roll back an
    /// already-created `Pending` record.
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// Unknown reference on a status query.
    #[error("unknown reference '{0}'")]
    NotFound(Reference),
}

/// A checkout field failed validation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid field '{field}': {message}")]
pub struct ValidationError {
    /// Form field that failed.
    pub field: &'static str,
    /// What was wrong with it.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error for the given field.
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Token acquisition failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The gateway rejected the client credentials.
    #[error("gateway rejected client credentials: {0}")]
    Rejected(String),

    /// The token endpoint could not be reached or answered garbage.
    #[error("token endpoint unreachable: {0}")]
    Unreachable(String),
}

/// An outbound gateway call failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// The gateway rejected the bearer token. Callers invalidate the cached
    /// credential and retry the operation at most once.
    #[error("gateway rejected bearer token")]
    Unauthorized,

    /// The gateway answered but did not accept the request.
    #[error("gateway declined request: {0}")]
    Declined(String),

    /// Transport-level failure (connect, timeout, malformed response).
    #[error("gateway request failed: {0}")]
    Transport(String),
}

/// A transaction with this reference already exists in the store.
#[derive(Debug, Clone, thiserror::Error)]
#[error("reference '{reference}' already exists")]
pub struct DuplicateReference {
    /// The colliding reference.
    pub reference: Reference,
}
