use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::{info, warn};

use crate::config::ProbeConfig;
use crate::error::DeliveryError;
use crate::signing::{sign, SignedRequest};
use crate::types::{BotSecret, TalkEvent};

/// Characters of the response body kept in a [`DeliveryReport`].
pub const REPORT_BODY_LIMIT: usize = 200;

/// Characters of the request body shown in diagnostics.
const LOG_BODY_LIMIT: usize = 100;

/// What came back from the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub status: u16,
    /// Response body, truncated to [`REPORT_BODY_LIMIT`] characters.
    pub body: String,
}

impl DeliveryReport {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends signed test events to a webhook endpoint.
pub struct WebhookClient {
    http: reqwest::Client,
    secret: BotSecret,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret: config.secret.clone(),
            timeout: config.request_timeout,
        }
    }

    /// Serialize, sign and post a Talk event.
    pub async fn send_event(
        &self,
        url: &str,
        event: &TalkEvent,
    ) -> Result<DeliveryReport, DeliveryError> {
        let body = event
            .to_body()
            .map_err(|e| DeliveryError::Serialize(e.to_string()))?;
        self.send_raw(url, body).await
    }

    /// Sign and post an arbitrary body.
    pub async fn send_raw(
        &self,
        url: &str,
        body: impl Into<Vec<u8>>,
    ) -> Result<DeliveryReport, DeliveryError> {
        let signed = sign(&self.secret, body);
        self.post(url, signed).await
    }

    async fn post(&self, url: &str, signed: SignedRequest) -> Result<DeliveryReport, DeliveryError> {
        info!(random = %signed.nonce, signature = %signed.signature, "Computed HMAC signature");
        info!(
            url,
            body = %truncate(&String::from_utf8_lossy(&signed.body), LOG_BODY_LIMIT),
            "Sending test request"
        );

        let mut request = self
            .http
            .post(url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in signed.headers() {
            request = request.header(name, value);
        }

        let response = request
            .body(signed.body)
            .send()
            .await
            .map_err(|e| match DeliveryError::from(e) {
                DeliveryError::ConnectionFailed { .. } => DeliveryError::ConnectionFailed {
                    url: url.to_string(),
                },
                other => other,
            })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(DeliveryError::from)?;
        let report = DeliveryReport {
            status,
            body: truncate(&text, REPORT_BODY_LIMIT),
        };

        if report.is_success() {
            info!(status, body = %report.body, "Webhook test successful");
        } else {
            warn!(status, body = %report.body, "Webhook test failed");
        }

        Ok(report)
    }
}

/// Truncate to at most `max` characters, never splitting a code point.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("äöü", 2), "äö");
    }

    #[test]
    fn test_report_success_range() {
        let report = |status| DeliveryReport { status, body: String::new() };
        assert!(report(200).is_success());
        assert!(report(204).is_success());
        assert!(!report(401).is_success());
        assert!(!report(500).is_success());
    }
}
