//! HTTP order sender.
//!
//! POSTs the signed action JSON to `{base_url}/exchange` and maps the
//! exchange's `{"status": "ok" | "err", "response": ...}` envelope into a
//! [`SendResult`].

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::sender::{BoxFuture, OrderSender, OrderStatus, SendResult, SignedAction};

/// Default timeout for exchange requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";

pub struct HttpSender {
    client: Client,
    exchange_url: String,
}

impl HttpSender {
    /// # Arguments
    /// * `base_url` - API root, e.g. "https://api.hyperliquid.xyz"
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            exchange_url: format!("{}/exchange", base_url.trim_end_matches('/')),
        })
    }

    pub fn exchange_url(&self) -> &str {
        &self.exchange_url
    }

    async fn post(&self, action: SignedAction) -> SendResult {
        let body = match action.to_json() {
            Ok(body) => body,
            Err(e) => return SendResult::Error(e.to_string()),
        };

        debug!(url = %self.exchange_url, nonce = action.nonce, "posting signed action");

        let response = match self
            .client
            .post(&self.exchange_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_connect() || e.is_timeout() => {
                warn!(error = %e, "exchange unreachable");
                return SendResult::Disconnected;
            }
            Err(e) => return SendResult::Error(format!("HTTP request failed: {e}")),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return SendResult::RateLimited;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return SendResult::Error(format!("HTTP {status}: {body}"));
        }

        match response.json::<Value>().await {
            Ok(body) => parse_exchange_response(&body),
            Err(e) => SendResult::Error(format!("Failed to parse response: {e}")),
        }
    }
}

impl OrderSender for HttpSender {
    fn send(&self, action: SignedAction) -> BoxFuture<'_, SendResult> {
        Box::pin(self.post(action))
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Map an exchange response body to a [`SendResult`].
///
/// ```text
/// {"status":"ok","response":{"type":"order","data":{"statuses":[{"resting":{"oid":1}}]}}}
/// {"status":"err","response":"User or API Wallet does not exist."}
/// ```
pub fn parse_exchange_response(body: &Value) -> SendResult {
    match body.get("status").and_then(Value::as_str) {
        Some("ok") => {}
        Some("err") => {
            let message = match body.get("response") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "unspecified error".to_string(),
            };
            return SendResult::Rejected(message);
        }
        _ => return SendResult::Error(format!("unexpected response: {body}")),
    }

    let Some(statuses) = body
        .pointer("/response/data/statuses")
        .and_then(Value::as_array)
    else {
        return SendResult::Accepted(Vec::new());
    };

    SendResult::Accepted(statuses.iter().map(parse_order_status).collect())
}

fn parse_order_status(status: &Value) -> OrderStatus {
    if let Some(resting) = status.get("resting") {
        return OrderStatus::Resting {
            oid: resting.get("oid").and_then(Value::as_u64).unwrap_or_default(),
        };
    }
    if let Some(filled) = status.get("filled") {
        let text = |key: &str| {
            filled
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        return OrderStatus::Filled {
            oid: filled.get("oid").and_then(Value::as_u64).unwrap_or_default(),
            total_sz: text("totalSz"),
            avg_px: text("avgPx"),
        };
    }
    match status.get("error") {
        Some(Value::String(e)) => OrderStatus::Error(e.clone()),
        _ => OrderStatus::Error(format!("unrecognized order status: {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exchange_url() {
        let sender = HttpSender::new("https://api.hyperliquid-testnet.xyz/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(sender.exchange_url(), "https://api.hyperliquid-testnet.xyz/exchange");
        assert!(sender.is_ready());
    }

    #[test]
    fn test_parse_ok_statuses() {
        let body = json!({
            "status": "ok",
            "response": {"type": "order", "data": {"statuses": [
                {"resting": {"oid": 77738308}},
                {"filled": {"totalSz": "0.02", "avgPx": "1891.4", "oid": 77747314}},
                {"error": "Order must have minimum value of $10."}
            ]}}
        });
        assert_eq!(
            parse_exchange_response(&body),
            SendResult::Accepted(vec![
                OrderStatus::Resting { oid: 77738308 },
                OrderStatus::Filled {
                    oid: 77747314,
                    total_sz: "0.02".into(),
                    avg_px: "1891.4".into()
                },
                OrderStatus::Error("Order must have minimum value of $10.".into()),
            ])
        );
    }

    #[test]
    fn test_parse_err() {
        let body = json!({"status": "err", "response": "User or API Wallet does not exist."});
        assert_eq!(
            parse_exchange_response(&body),
            SendResult::Rejected("User or API Wallet does not exist.".into())
        );
    }

    #[test]
    fn test_parse_unexpected() {
        assert!(matches!(
            parse_exchange_response(&json!({"foo": 1})),
            SendResult::Error(_)
        ));
        assert_eq!(
            parse_exchange_response(&json!({"status": "ok", "response": {"type": "default"}})),
            SendResult::Accepted(vec![])
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_retryable() {
        // Port 9 (discard) on localhost is closed on test machines.
        let sender = HttpSender::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let action = crate::sender::SignedAction::new(
            crate::wire::OrderAction::new(vec![], hlx_core::Grouping::Na),
            1,
            crate::sender::ActionSignature {
                r: format!("0x{}", "00".repeat(32)),
                s: format!("0x{}", "00".repeat(32)),
                v: 27,
            },
            None,
            None,
        );
        assert!(sender.send(action).await.is_retryable());
    }
}
