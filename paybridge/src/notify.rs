//! Best-effort payment alerts.
//!
//! The payment is the source of truth; the alert is advisory. Delivery
//! failures are logged and swallowed — they never reverse a transition and
//! never propagate to the reconciler.

use std::sync::Arc;

use async_trait::async_trait;

use crate::transaction::Transaction;

/// Title used when the server config does not override it.
pub const DEFAULT_ALERT_TITLE: &str = "\u{1f4b0} Venda Aprovada!";

/// A human-readable push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Short headline.
    pub title: String,
    /// Message body.
    pub text: String,
}

/// Alert delivery failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("alert delivery failed: {0}")]
pub struct AlertError(pub String);

/// External alert collaborator (push-notification provider).
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Delivers the alert.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError`] on any delivery failure; callers are expected
    /// to swallow it.
    async fn send(&self, alert: &Alert) -> Result<(), AlertError>;
}

/// Fires one alert per transaction reaching `PAID`.
///
/// The exactly-once guarantee is not enforced here — it follows from the
/// caller only invoking [`Notifier::payment_received`] after winning the
/// store's compare-and-set.
pub struct Notifier {
    sink: Arc<dyn AlertSink>,
    title: String,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    /// Creates a notifier with the default title.
    #[must_use]
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self::with_title(sink, DEFAULT_ALERT_TITLE)
    }

    /// Creates a notifier with a custom alert title.
    #[must_use]
    pub fn with_title(sink: Arc<dyn AlertSink>, title: impl Into<String>) -> Self {
        Self {
            sink,
            title: title.into(),
        }
    }

    /// Announces a paid transaction. Best-effort: failures are logged at
    /// `warn` and dropped.
    pub async fn payment_received(&self, tx: &Transaction) {
        let alert = Alert {
            title: self.title.clone(),
            text: format!("{} pagou {} MT por {}", tx.payer_name, tx.amount, tx.method),
        };
        if let Err(err) = self.sink.send(&alert).await {
            tracing::warn!(reference = %tx.reference, error = %err, "payment alert not delivered");
        }
    }
}
