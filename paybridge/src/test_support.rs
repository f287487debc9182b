//! Shared doubles for in-crate tests: a scripted gateway and a counting
//! alert sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::error::{AuthError, GatewayError};
use crate::gateway::{Credential, Gateway, GatewayStatus, PaymentStart};
use crate::notify::{Alert, AlertError, AlertSink};
use crate::transaction::{Msisdn, PaymentMethod, Reference, Transaction};

pub fn pending_tx(reference: &str) -> Transaction {
    Transaction::new(
        Reference::from(reference),
        "Ana",
        Msisdn::parse("841234567").unwrap(),
        PaymentMethod::Mpesa,
        Decimal::from(297),
    )
}

/// Scripted [`Gateway`] double.
///
/// Counts calls and pops scripted results; defaults to success when the
/// script runs dry.
#[derive(Default)]
pub struct FakeGateway {
    pub token_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
    pub token_ttl_secs: AtomicUsize,
    start_script: Mutex<Vec<Result<(), GatewayError>>>,
    lookup_script: Mutex<Vec<Result<GatewayStatus, GatewayError>>>,
    fail_auth: std::sync::atomic::AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        let gateway = Self::default();
        gateway.token_ttl_secs.store(3600, Ordering::SeqCst);
        Arc::new(gateway)
    }

    /// Queues a result for the next `start_payment` call (LIFO).
    pub async fn script_start(&self, result: Result<(), GatewayError>) {
        self.start_script.lock().await.push(result);
    }

    /// Queues a result for the next `lookup_status` call (LIFO).
    pub async fn script_lookup(&self, result: Result<GatewayStatus, GatewayError>) {
        self.lookup_script.lock().await.push(result);
    }

    /// Makes every subsequent `fetch_token` fail.
    pub fn reject_auth(&self) {
        self.fail_auth.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn fetch_token(&self) -> Result<Credential, AuthError> {
        let n = self.token_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(AuthError::Rejected("invalid_client".to_owned()));
        }
        let ttl = self.token_ttl_secs.load(Ordering::SeqCst) as u64;
        Ok(Credential::new(
            format!("tok-{n}"),
            std::time::Duration::from_secs(ttl),
        ))
    }

    async fn start_payment(
        &self,
        _credential: &Credential,
        _payment: &PaymentStart,
    ) -> Result<(), GatewayError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.start_script.lock().await.pop().unwrap_or(Ok(()))
    }

    async fn lookup_status(
        &self,
        _credential: &Credential,
        _method: PaymentMethod,
        _reference: &Reference,
    ) -> Result<GatewayStatus, GatewayError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.lookup_script
            .lock()
            .await
            .pop()
            .unwrap_or(Ok(GatewayStatus::Pending))
    }
}

/// [`AlertSink`] double that counts deliveries and can be told to fail.
#[derive(Default)]
pub struct CountingSink {
    pub sent: AtomicUsize,
    fail: std::sync::atomic::AtomicBool,
}

impl CountingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_deliveries(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AlertSink for CountingSink {
    async fn send(&self, _alert: &Alert) -> Result<(), AlertError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(AlertError("delivery refused".to_owned()))
        } else {
            Ok(())
        }
    }
}
