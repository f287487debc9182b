//! Dual-path confirmation reconciliation.
//!
//! Two independent signals race to settle a pending transaction: the
//! gateway's asynchronous webhook and an active status lookup driven by
//! client polling. Both converge on the store's compare-and-set, so
//! whichever path transitions first is authoritative and the loser observes
//! a no-op. A winning `Pending -> Paid` transition is the single permission
//! gate for firing the payment alert, which is what makes the notification
//! exactly-once under races.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{GatewayError, PaymentError};
use crate::gateway::{Gateway, GatewayStatus};
use crate::notify::Notifier;
use crate::store::TransactionStore;
use crate::token::TokenProvider;
use crate::transaction::{Reference, Transaction, TxStatus};

/// Confirmation outcome carried by a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The gateway reports the payment went through.
    Success,
    /// Anything else the gateway may push; ignored by the state machine.
    Other,
}

impl WebhookOutcome {
    /// Maps the raw `status` string of a webhook body.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        if status.trim().eq_ignore_ascii_case("success") {
            Self::Success
        } else {
            Self::Other
        }
    }
}

/// What a reconciliation attempt did, for logging and tests. The HTTP
/// webhook handler acknowledges regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileEffect {
    /// This attempt won the transition to the given terminal state.
    Transitioned(TxStatus),
    /// The record was already terminal (duplicate or late delivery).
    AlreadySettled,
    /// No such reference; possibly a redelivery after eviction.
    UnknownReference,
    /// Nothing to do: non-success webhook outcome or gateway still pending.
    NoChange,
}

/// Advances pending transactions to terminal states.
pub struct ConfirmationReconciler {
    store: Arc<TransactionStore>,
    tokens: Arc<TokenProvider>,
    gateway: Arc<dyn Gateway>,
    notifier: Notifier,
    min_poll_interval: Duration,
}

impl std::fmt::Debug for ConfirmationReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationReconciler")
            .field("min_poll_interval", &self.min_poll_interval)
            .finish_non_exhaustive()
    }
}

impl ConfirmationReconciler {
    /// Creates a reconciler. `min_poll_interval` bounds how often the poll
    /// path may query the gateway for one reference.
    #[must_use]
    pub fn new(
        store: Arc<TransactionStore>,
        tokens: Arc<TokenProvider>,
        gateway: Arc<dyn Gateway>,
        notifier: Notifier,
        min_poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            tokens,
            gateway,
            notifier,
            min_poll_interval,
        }
    }

    /// Webhook path: applies an asynchronous confirmation pushed by the
    /// gateway.
    ///
    /// Unknown references and non-success outcomes are ignored — the
    /// gateway retries deliveries, and duplicate or late pushes against a
    /// terminal record are no-ops by construction.
    pub async fn apply_webhook(
        &self,
        reference: &Reference,
        outcome: WebhookOutcome,
    ) -> ReconcileEffect {
        let Some(tx) = self.store.get(reference) else {
            tracing::debug!(reference = %reference, "webhook for unknown reference ignored");
            return ReconcileEffect::UnknownReference;
        };

        match outcome {
            WebhookOutcome::Success => {
                let effect = self.settle(&tx, TxStatus::Paid).await;
                if matches!(effect, ReconcileEffect::Transitioned(_)) {
                    tracing::info!(reference = %reference, "webhook confirmed payment");
                }
                effect
            }
            WebhookOutcome::Other => {
                tracing::debug!(
                    reference = %reference,
                    status = %tx.status,
                    "non-success webhook outcome ignored"
                );
                ReconcileEffect::NoChange
            }
        }
    }

    /// Poll path: actively queries the gateway for a pending record and
    /// applies the result, then reports the record's current status.
    ///
    /// The store admits at most one gateway lookup per reference per
    /// `min_poll_interval`; callers that lose the admission simply observe
    /// the current state. Gateway or auth failures during polling are
    /// logged and leave the record pending — polling must never corrupt
    /// state.
    ///
    /// # Errors
    ///
    /// [`PaymentError::NotFound`] when the reference is unknown.
    pub async fn poll(&self, reference: &Reference) -> Result<TxStatus, PaymentError> {
        let tx = self
            .store
            .get(reference)
            .ok_or_else(|| PaymentError::NotFound(reference.clone()))?;

        if tx.status.is_terminal() {
            return Ok(tx.status);
        }
        if !self.store.try_begin_poll(reference, self.min_poll_interval) {
            // too soon, another poll in flight, or settled in the meantime
            return Ok(self.current_status(reference, tx.status));
        }

        match self.lookup_with_retry(&tx.method, reference).await {
            Ok(GatewayStatus::Success) => {
                self.settle(&tx, TxStatus::Paid).await;
            }
            Ok(GatewayStatus::Failed) => {
                if self
                    .store
                    .compare_and_set_status(reference, TxStatus::Pending, TxStatus::Failed)
                {
                    tracing::info!(reference = %reference, "poll resolved payment as failed");
                }
            }
            Ok(GatewayStatus::Pending) => {}
            Err(err) => {
                tracing::warn!(reference = %reference, error = %err, "status lookup failed");
            }
        }

        Ok(self.current_status(reference, tx.status))
    }

    /// Applies a terminal transition through the compare-and-set and, when
    /// this call is the winner of a `Paid` transition, fires the alert.
    ///
    /// The alert is built from the caller's snapshot of the record — its
    /// identity fields are immutable — so an eviction sweep removing the
    /// record right after the winning transition cannot suppress the
    /// notification.
    async fn settle(&self, tx: &Transaction, terminal: TxStatus) -> ReconcileEffect {
        if !self
            .store
            .compare_and_set_status(&tx.reference, TxStatus::Pending, terminal)
        {
            return ReconcileEffect::AlreadySettled;
        }
        if terminal == TxStatus::Paid {
            self.notifier.payment_received(tx).await;
        }
        ReconcileEffect::Transitioned(terminal)
    }

    async fn lookup_with_retry(
        &self,
        method: &crate::transaction::PaymentMethod,
        reference: &Reference,
    ) -> Result<GatewayStatus, PaymentError> {
        let credential = self.tokens.get().await?;
        match self
            .gateway
            .lookup_status(&credential, *method, reference)
            .await
        {
            Err(GatewayError::Unauthorized) => {
                self.tokens.invalidate().await;
                let credential = self.tokens.get().await?;
                self.gateway
                    .lookup_status(&credential, *method, reference)
                    .await
                    .map_err(PaymentError::from)
            }
            Err(err) => Err(err.into()),
            Ok(status) => Ok(status),
        }
    }

    fn current_status(&self, reference: &Reference, fallback: TxStatus) -> TxStatus {
        self.store
            .get(reference)
            .map_or(fallback, |tx| tx.status)
    }
}
