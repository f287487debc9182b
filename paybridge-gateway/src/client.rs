//! `reqwest`-based implementation of the mobile-money gateway contract.
//!
//! Wire formats follow the e2Payments-style API the bridge fronts:
//!
//! - `POST {base}/oauth/token` — client-credentials grant returning
//!   `{access_token, expires_in}`
//! - `POST {base}/v1/c2b/mpesa-payment/{wallet_id}` — pushes a payment
//!   prompt to the payer's handset; the body carries the local reference so
//!   confirmations can be correlated
//! - `GET {base}/v1/c2b/payment-status/{wallet_id}/{reference}` — status
//!   lookup for the poll path

use std::time::Duration;

use async_trait::async_trait;
use paybridge::error::{AuthError, GatewayError};
use paybridge::gateway::{Credential, Gateway, GatewayStatus, PaymentStart};
use paybridge::transaction::{PaymentMethod, Reference};
use serde::{Deserialize, Serialize};

/// Connection settings for [`HttpGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway base URL, without trailing slash.
    pub base_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Wallet id used for M-Pesa payments.
    pub wallet_mpesa: String,
    /// Wallet id used for E-Mola payments.
    pub wallet_emola: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    client_id: &'a str,
    amount: String,
    phone: &'a str,
    reference: &'a str,
}

/// The gateway answers payment-start with either a `status` string or a
/// boolean `success` flag depending on the wallet backend.
#[derive(Debug, Deserialize)]
struct StartResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

/// HTTP client for the mobile-money gateway.
pub struct HttpGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.config.base_url)
            .field("wallet_mpesa", &self.config.wallet_mpesa)
            .field("wallet_emola", &self.config.wallet_emola)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Creates a gateway client with its own connection pool.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized.
    #[must_use]
    pub fn new(mut config: GatewayConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_owned();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build reqwest::Client");
        Self { config, client }
    }

    fn wallet_id(&self, method: PaymentMethod) -> &str {
        match method {
            PaymentMethod::Mpesa => &self.config.wallet_mpesa,
            PaymentMethod::Emola => &self.config.wallet_emola,
        }
    }

    fn map_gateway_status(raw: &str) -> GatewayStatus {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => GatewayStatus::Success,
            "FAILED" | "CANCELLED" | "EXPIRED" => GatewayStatus::Failed,
            _ => GatewayStatus::Pending,
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn fetch_token(&self) -> Result<Credential, AuthError> {
        let body = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
        };

        let response = self
            .client
            .post(format!("{}/oauth/token", self.config.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!("{status}: {text}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Unreachable(format!("token response parse error: {e}")))?;

        Ok(Credential::new(
            token.access_token,
            Duration::from_secs(token.expires_in),
        ))
    }

    async fn start_payment(
        &self,
        credential: &Credential,
        payment: &PaymentStart,
    ) -> Result<(), GatewayError> {
        let body = StartRequest {
            client_id: &self.config.client_id,
            amount: payment.amount.to_string(),
            phone: payment.phone.as_str(),
            reference: payment.reference.as_str(),
        };

        let response = self
            .client
            .post(format!(
                "{}/v1/c2b/mpesa-payment/{}",
                self.config.base_url,
                self.wallet_id(payment.method)
            ))
            .bearer_auth(credential.value())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Declined(format!("{status}: {text}")));
        }

        let accepted: StartResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("start response parse error: {e}")))?;

        let ok = accepted.status.as_deref().is_some_and(|s| s == "SUCCESS")
            || accepted.success == Some(true);
        if ok {
            tracing::debug!(reference = %payment.reference, "payment-start accepted");
            Ok(())
        } else {
            Err(GatewayError::Declined(
                accepted
                    .message
                    .unwrap_or_else(|| "payment not processed".to_owned()),
            ))
        }
    }

    async fn lookup_status(
        &self,
        credential: &Credential,
        method: PaymentMethod,
        reference: &Reference,
    ) -> Result<GatewayStatus, GatewayError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/c2b/payment-status/{}/{}",
                self.config.base_url,
                self.wallet_id(method),
                reference
            ))
            .bearer_auth(credential.value())
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Transport(format!("{status}: {text}")));
        }

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("status response parse error: {e}")))?;

        let mapped = Self::map_gateway_status(&parsed.status);
        tracing::debug!(reference = %reference, raw = %parsed.status, "status lookup answered");
        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use paybridge::transaction::Msisdn;
    use rust_decimal::Decimal;
    use wiremock::matchers::{bearer_token, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(base_url: String) -> GatewayConfig {
        GatewayConfig {
            base_url,
            client_id: "cid".to_owned(),
            client_secret: "secret".to_owned(),
            wallet_mpesa: "993607".to_owned(),
            wallet_emola: "993606".to_owned(),
            timeout: Duration::from_secs(5),
        }
    }

    fn start(reference: &str) -> PaymentStart {
        PaymentStart {
            reference: Reference::from(reference),
            phone: Msisdn::parse("841234567").unwrap(),
            method: PaymentMethod::Mpesa,
            amount: Decimal::from(297),
        }
    }

    #[tokio::test]
    async fn test_fetch_token_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok123",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(config(server.uri()));
        let credential = gateway.fetch_token().await.unwrap();
        assert_eq!(credential.value(), "tok123");
        assert!(!credential.is_expired());
    }

    #[tokio::test]
    async fn test_fetch_token_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(config(server.uri()));
        assert!(matches!(
            gateway.fetch_token().await,
            Err(AuthError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_token_unreachable() {
        // no mock server listening
        let gateway = HttpGateway::new(config("http://127.0.0.1:9".to_owned()));
        assert!(matches!(
            gateway.fetch_token().await,
            Err(AuthError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_start_payment_posts_wallet_route_with_reference() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/c2b/mpesa-payment/993607"))
            .and(bearer_token("tok"))
            .and(body_json(serde_json::json!({
                "client_id": "cid",
                "amount": "297",
                "phone": "841234567",
                "reference": "TX1",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "SUCCESS" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(config(server.uri()));
        let credential = Credential::new("tok", Duration::from_secs(3600));
        gateway.start_payment(&credential, &start("TX1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_payment_accepts_boolean_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/c2b/mpesa-payment/993607"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })),
            )
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(config(server.uri()));
        let credential = Credential::new("tok", Duration::from_secs(3600));
        gateway.start_payment(&credential, &start("TX1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_payment_declined_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/c2b/mpesa-payment/993607"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "FAILED",
                "message": "insufficient funds",
            })))
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(config(server.uri()));
        let credential = Credential::new("tok", Duration::from_secs(3600));
        let err = gateway
            .start_payment(&credential, &start("TX1"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Declined(msg) if msg.contains("insufficient")));
    }

    #[tokio::test]
    async fn test_start_payment_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/c2b/mpesa-payment/993607"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(config(server.uri()));
        let credential = Credential::new("stale", Duration::from_secs(3600));
        assert!(matches!(
            gateway.start_payment(&credential, &start("TX1")).await,
            Err(GatewayError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_lookup_status_mapping() {
        for (raw, expected) in [
            ("SUCCESS", GatewayStatus::Success),
            ("FAILED", GatewayStatus::Failed),
            ("CANCELLED", GatewayStatus::Failed),
            ("EXPIRED", GatewayStatus::Failed),
            ("PENDING", GatewayStatus::Pending),
            ("PROCESSING", GatewayStatus::Pending),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/c2b/payment-status/993606/TX9"))
                .and(bearer_token("tok"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({ "status": raw })),
                )
                .mount(&server)
                .await;

            let gateway = HttpGateway::new(config(server.uri()));
            let credential = Credential::new("tok", Duration::from_secs(3600));
            let status = gateway
                .lookup_status(&credential, PaymentMethod::Emola, &Reference::from("TX9"))
                .await
                .unwrap();
            assert_eq!(status, expected, "raw status {raw}");
        }
    }

    #[tokio::test]
    async fn test_lookup_status_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/c2b/payment-status/993607/TX9"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(config(server.uri()));
        let credential = Credential::new("stale", Duration::from_secs(3600));
        assert!(matches!(
            gateway
                .lookup_status(&credential, PaymentMethod::Mpesa, &Reference::from("TX9"))
                .await,
            Err(GatewayError::Unauthorized)
        ));
    }
}
