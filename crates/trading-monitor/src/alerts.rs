//! Operator alerts for cycles that need a human.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info};
use trading_core::error::TradingError;

/// Something an operator has to look at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// Failure class, e.g. "inconsistent_state"
    pub kind: String,
    pub pair: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: impl Into<String>, pair: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            pair: pair.into(),
            message: message.into(),
            raised_at: Utc::now(),
        }
    }

    /// Alert describing a failed cycle.
    pub fn from_error(pair: &str, err: &TradingError) -> Self {
        Self::new(err.kind().to_string(), pair, err.to_string())
    }
}

/// Destination for operator alerts.
///
/// Delivery is best effort: sinks log their own failures and never return
/// them, so a broken alert channel cannot stop the trading loop.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert);

    fn name(&self) -> &str;
}

/// Writes alerts to the log at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send(&self, alert: &Alert) {
        error!(
            kind = %alert.kind,
            pair = %alert.pair,
            "OPERATOR ATTENTION NEEDED: {}",
            alert.message
        );
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Posts alerts as JSON to a webhook (Slack and Discord compatible text field).
#[derive(Clone)]
pub struct WebhookAlertSink {
    client: Client,
    webhook_url: String,
}

impl WebhookAlertSink {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }

    fn payload(alert: &Alert) -> serde_json::Value {
        let text = format!("[{}] {}: {}", alert.kind, alert.pair, alert.message);
        json!({
            "text": text,
            "content": text,
            "alert": alert,
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn send(&self, alert: &Alert) {
        match self
            .client
            .post(&self.webhook_url)
            .json(&Self::payload(alert))
            .send()
            .await
        {
            Ok(response) => {
                if response.status().is_success() {
                    info!(kind = %alert.kind, "Webhook alert sent");
                } else {
                    error!("Alert webhook failed: {}", response.status());
                }
            }
            Err(e) => {
                error!("Failed to send alert webhook: {}", e);
            }
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_from_error() {
        let err = TradingError::InconsistentState {
            reason: "no funds and no orders".into(),
        };
        let alert = Alert::from_error("XBTUSD", &err);
        assert_eq!(alert.kind, "inconsistent_state");
        assert_eq!(alert.pair, "XBTUSD");
        assert!(alert.message.contains("no funds and no orders"));
    }

    #[test]
    fn test_webhook_payload() {
        let alert = Alert::new("inconsistent_state", "XBTUSD", "help");
        let payload = WebhookAlertSink::payload(&alert);
        assert_eq!(payload["text"], "[inconsistent_state] XBTUSD: help");
        assert_eq!(payload["alert"]["pair"], "XBTUSD");
    }

    #[tokio::test]
    async fn test_webhook_failure_is_swallowed() {
        // Nothing listens on the discard port.
        let sink = WebhookAlertSink::new("http://127.0.0.1:9/hook", Duration::from_millis(200));
        sink.send(&Alert::new("inconsistent_state", "XBTUSD", "help")).await;
        LogAlertSink.send(&Alert::new("inconsistent_state", "XBTUSD", "help")).await;
    }
}
