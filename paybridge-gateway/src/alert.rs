//! Pushcut-style push-notification sink.
//!
//! Delivers `{title, text}` payloads to a single webhook URL. The notifier
//! in the core crate swallows any error this returns; delivery is advisory.

use std::time::Duration;

use async_trait::async_trait;
use paybridge::notify::{Alert, AlertError, AlertSink};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PushPayload<'a> {
    title: &'a str,
    text: &'a str,
}

/// Sends alerts to a push-notification webhook.
pub struct PushSink {
    url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for PushSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushSink")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl PushSink {
    /// Creates a sink posting to `url`.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized.
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest::Client");
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl AlertSink for PushSink {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        let payload = PushPayload {
            title: &alert.title,
            text: &alert.text,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AlertError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AlertError(format!("push endpoint answered {status}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_send_posts_title_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .and(body_json(serde_json::json!({
                "title": "\u{1f4b0} Venda Aprovada!",
                "text": "Ana pagou 297 MT por mpesa",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = PushSink::new(format!("{}/notify", server.uri()), Duration::from_secs(5));
        sink.send(&Alert {
            title: "\u{1f4b0} Venda Aprovada!".to_owned(),
            text: "Ana pagou 297 MT por mpesa".to_owned(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sink = PushSink::new(format!("{}/notify", server.uri()), Duration::from_secs(5));
        let err = sink
            .send(&Alert {
                title: "t".to_owned(),
                text: "x".to_owned(),
            })
            .await
            .unwrap_err();
        assert!(err.0.contains("500"));
    }
}
