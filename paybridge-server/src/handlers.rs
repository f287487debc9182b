//! Axum route handlers for the checkout bridge.
//!
//! Inbound surface:
//! - `POST /pagar` — checkout form intake, starts a payment
//! - `GET /status?ref=` — client polling, may trigger an active gateway
//!   lookup for stale pending records
//! - `POST /webhook/pagamento-confirmado` — gateway confirmation push;
//!   always acknowledged per the upstream redelivery contract
//! - `GET /health` — liveness payload
//!
//! Route paths and form field names are fixed by the upstream contract and
//! the deployed checkout page; the Portuguese names are deliberate.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Form, Query, State};
use axum::{Json, Router};
use paybridge::reconciler::WebhookOutcome;
use paybridge::transaction::Reference;
use paybridge::{CheckoutRequest, ConfirmationReconciler, PaymentInitiator, TransactionStore};
use serde::Deserialize;

use crate::error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Transaction store, read directly by the health endpoint.
    pub store: Arc<TransactionStore>,
    /// Checkout intake.
    pub initiator: Arc<PaymentInitiator>,
    /// Webhook and poll confirmation paths.
    pub reconciler: Arc<ConfirmationReconciler>,
    /// Where to send the payer after a successful initiation.
    pub redirect_url: Option<String>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("redirect_url", &self.redirect_url)
            .finish_non_exhaustive()
    }
}

/// Checkout form fields, named by the deployed payment page.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    /// Payer name.
    pub nome: String,
    /// Payer e-mail.
    pub email: String,
    /// Payer phone number.
    pub telefone: String,
    /// Wallet operator ("mpesa" / "emola").
    pub metodo: String,
}

/// `POST /pagar` — validates the form and initiates a payment.
///
/// # Errors
///
/// 400 on validation failure, 502 on gateway/auth trouble. A gateway
/// failure after the record was created does not remove it; the payer may
/// still approve the prompt and the webhook will settle it.
pub async fn post_pagar(
    State(state): State<AppState>,
    Form(form): Form<CheckoutForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reference = state
        .initiator
        .initiate(CheckoutRequest {
            payer_name: form.nome,
            email: form.email,
            phone: form.telefone,
            method: form.metodo,
        })
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "reference": reference,
        "redirect_url": state.redirect_url,
    })))
}

/// Query string for the status endpoint.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Transaction reference under `ref=`.
    #[serde(rename = "ref")]
    pub reference: String,
}

/// `GET /status?ref=` — read-only projection of a transaction's state.
///
/// For pending records past the minimum poll interval this actively
/// queries the gateway before answering, so a client poll can settle the
/// transaction even if the webhook never arrives.
///
/// # Errors
///
/// 404 for unknown references.
pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reference = Reference::from(query.reference);
    let status = state.reconciler.poll(&reference).await?;
    Ok(Json(serde_json::json!({ "status": status })))
}

/// Webhook body pushed by the gateway.
#[derive(Debug, Deserialize)]
struct WebhookBody {
    status: String,
    reference: String,
}

/// `POST /webhook/pagamento-confirmado` — gateway confirmation push.
///
/// Always answers `200 {"received": true}`: erroring would only provoke
/// redelivery storms from the upstream retry policy. Malformed payloads
/// and unknown references are logged and acknowledged.
pub async fn post_webhook(State(state): State<AppState>, body: Bytes) -> Json<serde_json::Value> {
    match serde_json::from_slice::<WebhookBody>(&body) {
        Ok(hook) => {
            let reference = Reference::from(hook.reference);
            let outcome = WebhookOutcome::from_status(&hook.status);
            let effect = state.reconciler.apply_webhook(&reference, outcome).await;
            tracing::debug!(reference = %reference, ?effect, "webhook processed");
        }
        Err(err) => {
            tracing::warn!(error = %err, "malformed webhook payload acknowledged");
        }
    }
    Json(serde_json::json!({ "received": true }))
}

/// `GET /health` — liveness payload.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "transactions": state.store.len(),
    }))
}

/// Builds the bridge [`Router`] with all endpoints.
pub fn bridge_router(state: AppState) -> Router {
    Router::new()
        .route("/pagar", axum::routing::post(post_pagar))
        .route("/status", axum::routing::get(get_status))
        .route(
            "/webhook/pagamento-confirmado",
            axum::routing::post(post_webhook),
        )
        .route("/health", axum::routing::get(health))
        .with_state(state)
}
