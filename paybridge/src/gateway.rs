//! Outbound gateway abstraction.
//!
//! The mobile-money gateway is an opaque HTTP collaborator; the lifecycle
//! core only depends on this trait. The production implementation lives in
//! the `paybridge-gateway` crate; tests substitute scripted doubles.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{AuthError, GatewayError};
use crate::transaction::{Msisdn, PaymentMethod, Reference};

/// Safety margin subtracted from a token's advertised lifetime so a
/// credential is refreshed before the gateway actually expires it.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// A bearer credential obtained from the gateway's auth endpoint.
///
/// Transient: cached by [`crate::token::TokenProvider`], never persisted.
#[derive(Debug, Clone)]
pub struct Credential {
    value: String,
    expires_at: Instant,
}

impl Credential {
    /// Creates a credential valid for `ttl`, minus a safety margin.
    #[must_use]
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Instant::now() + ttl.saturating_sub(EXPIRY_MARGIN),
        }
    }

    /// Returns the raw bearer token.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the credential should no longer be used.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Everything the gateway needs to start a customer-to-business payment.
///
/// The reference is embedded so later confirmations (webhook or lookup) can
/// be correlated back to the local record.
#[derive(Debug, Clone)]
pub struct PaymentStart {
    /// Local correlation reference.
    pub reference: Reference,
    /// Payer phone number to charge.
    pub phone: Msisdn,
    /// Wallet operator, mapped to a wallet id by the implementation.
    pub method: PaymentMethod,
    /// Amount in meticais.
    pub amount: Decimal,
}

/// Outcome reported by the gateway's status-lookup operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    /// The gateway has not settled the payment yet.
    Pending,
    /// The payer approved and the payment went through.
    Success,
    /// The payment was declined, cancelled, or expired upstream.
    Failed,
}

/// The mobile-money gateway's three operations, as the lifecycle core
/// sees them.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Performs a client-credentials grant against the auth endpoint.
    ///
    /// # Errors
    ///
    /// [`AuthError::Rejected`] when the credentials are refused,
    /// [`AuthError::Unreachable`] on transport failure.
    async fn fetch_token(&self) -> Result<Credential, AuthError>;

    /// Asks the gateway to push a payment prompt to the payer's handset.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] when the bearer token is refused;
    /// other variants for declines and transport failures.
    async fn start_payment(
        &self,
        credential: &Credential,
        payment: &PaymentStart,
    ) -> Result<(), GatewayError>;

    /// Queries the gateway for the current state of a payment.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] when the bearer token is refused;
    /// other variants for transport failures.
    async fn lookup_status(
        &self,
        credential: &Credential,
        method: PaymentMethod,
        reference: &Reference,
    ) -> Result<GatewayStatus, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_fresh_until_margin() {
        let credential = Credential::new("tok", Duration::from_secs(3600));
        assert!(!credential.is_expired());
        assert_eq!(credential.value(), "tok");
    }

    #[test]
    fn test_credential_short_ttl_expires_immediately() {
        // ttl shorter than the margin saturates to zero
        let credential = Credential::new("tok", Duration::from_secs(5));
        assert!(credential.is_expired());
    }
}
