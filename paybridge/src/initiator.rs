//! Checkout validation and payment initiation.
//!
//! Validates the raw form input, inserts a `Pending` record, and asks the
//! gateway to push a payment prompt to the payer's handset. If the gateway
//! call fails the record deliberately stays `Pending` in the store — the
//! confirmation paths can still settle it if the prompt went out after all,
//! and the eviction sweep bounds the leak if it never did.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::{GatewayError, PaymentError, ValidationError};
use crate::gateway::{Gateway, PaymentStart};
use crate::store::TransactionStore;
use crate::token::TokenProvider;
use crate::transaction::{Msisdn, PaymentMethod, Reference, Transaction};

/// Attempts at generating a non-colliding reference before giving up.
const REFERENCE_ATTEMPTS: usize = 3;

/// Raw checkout form input, as received from the HTTP layer.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Payer name.
    pub payer_name: String,
    /// Payer e-mail, recorded but not verified.
    pub email: String,
    /// Payer phone number, unvalidated.
    pub phone: String,
    /// Wallet operator name ("mpesa" / "emola").
    pub method: String,
}

struct ValidatedCheckout {
    payer_name: String,
    phone: Msisdn,
    method: PaymentMethod,
}

impl CheckoutRequest {
    fn validate(self) -> Result<ValidatedCheckout, ValidationError> {
        if self.payer_name.trim().is_empty() {
            return Err(ValidationError::new("nome", "must not be empty"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::new("email", "must not be empty"));
        }
        let phone = Msisdn::parse(&self.phone)?;
        let method = self.method.parse::<PaymentMethod>()?;
        Ok(ValidatedCheckout {
            payer_name: self.payer_name.trim().to_owned(),
            phone,
            method,
        })
    }
}

/// Creates transactions and starts payments against the gateway.
pub struct PaymentInitiator {
    store: Arc<TransactionStore>,
    tokens: Arc<TokenProvider>,
    gateway: Arc<dyn Gateway>,
    reference_prefix: String,
    amount: Decimal,
}

impl std::fmt::Debug for PaymentInitiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentInitiator")
            .field("reference_prefix", &self.reference_prefix)
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

impl PaymentInitiator {
    /// Creates an initiator charging `amount` per checkout and generating
    /// references with `reference_prefix`.
    #[must_use]
    pub fn new(
        store: Arc<TransactionStore>,
        tokens: Arc<TokenProvider>,
        gateway: Arc<dyn Gateway>,
        reference_prefix: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            store,
            tokens,
            gateway,
            reference_prefix: reference_prefix.into(),
            amount,
        }
    }

    /// Validates the request, records a `Pending` transaction, and issues
    /// the payment-start call with the reference embedded for correlation.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::Validation`] for bad input; nothing is created.
    /// - [`PaymentError::Duplicate`] if reference generation keeps colliding.
    /// - [`PaymentError::Auth`] when no token could be obtained.
    /// - [`PaymentError::Gateway`] when the payment-start call fails; the
    ///   `Pending` record is not rolled back.
    pub async fn initiate(&self, request: CheckoutRequest) -> Result<Reference, PaymentError> {
        let checkout = request.validate()?;

        let reference = self.insert_pending(&checkout)?;
        tracing::info!(
            reference = %reference,
            method = %checkout.method,
            "payment initiated"
        );

        let start = PaymentStart {
            reference: reference.clone(),
            phone: checkout.phone,
            method: checkout.method,
            amount: self.amount,
        };
        self.start_with_retry(&start).await?;

        Ok(reference)
    }

    /// Generates a reference and inserts the record, regenerating on
    /// collision.
    fn insert_pending(&self, checkout: &ValidatedCheckout) -> Result<Reference, PaymentError> {
        let mut last_collision = None;
        for _ in 0..REFERENCE_ATTEMPTS {
            let reference = Reference::generate(&self.reference_prefix);
            let tx = Transaction::new(
                reference.clone(),
                checkout.payer_name.clone(),
                checkout.phone.clone(),
                checkout.method,
                self.amount,
            );
            match self.store.create(tx) {
                Ok(()) => return Ok(reference),
                Err(dup) => last_collision = Some(dup),
            }
        }
        // statistically unreachable, but the store's uniqueness guarantee
        // must never be bypassed
        Err(PaymentError::Duplicate(
            last_collision.expect("at least one attempt made"),
        ))
    }

    /// Issues the payment-start call, refetching the token once if the
    /// gateway rejects it.
    async fn start_with_retry(&self, start: &PaymentStart) -> Result<(), PaymentError> {
        let credential = self.tokens.get().await?;
        match self.gateway.start_payment(&credential, start).await {
            Err(GatewayError::Unauthorized) => {
                tracing::debug!(reference = %start.reference, "token rejected, refetching once");
                self.tokens.invalidate().await;
                let credential = self.tokens.get().await?;
                self.gateway
                    .start_payment(&credential, start)
                    .await
                    .map_err(PaymentError::from)
            }
            Err(err) => Err(err.into()),
            Ok(()) => Ok(()),
        }
    }
}
