//! Signed action envelope and the order sender seam.
//!
//! [`OrderSender`] separates signing from transport so the pipeline and the
//! basket manager can be driven by [`MockSender`] in tests and by
//! [`crate::HttpSender`] in production.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, PrimitiveSignature};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::error::EncodingError;
use crate::wire::OrderAction;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Per-order status returned by the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Resting { oid: u64 },
    Filled { oid: u64, total_sz: String, avg_px: String },
    Error(String),
}

/// Result of one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    /// Exchange answered `status: ok`; one status per order, in order.
    Accepted(Vec<OrderStatus>),
    /// Exchange answered `status: err`.
    Rejected(String),
    RateLimited,
    /// Could not reach the exchange.
    Disconnected,
    /// Transport or protocol failure.
    Error(String),
}

impl SendResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, SendResult::Accepted(_))
    }

    /// Transport-level failures are worth retrying; an exchange rejection
    /// needs a changed request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SendResult::Disconnected | SendResult::RateLimited | SendResult::Error(_)
        )
    }
}

/// EIP-712 signature components as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSignature {
    /// `0x` + 64 hex chars.
    pub r: String,
    /// `0x` + 64 hex chars.
    pub s: String,
    /// 27 or 28.
    pub v: u8,
}

impl From<&PrimitiveSignature> for ActionSignature {
    fn from(sig: &PrimitiveSignature) -> Self {
        Self {
            r: format!("0x{}", hex::encode(sig.r().to_be_bytes::<32>())),
            s: format!("0x{}", hex::encode(sig.s().to_be_bytes::<32>())),
            v: if sig.v() { 28 } else { 27 },
        }
    }
}

/// Signed action ready for transmission.
///
/// Serializes to `{action, nonce, signature, vaultAddress?, expiresAfter?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAction {
    pub action: OrderAction,
    pub nonce: u64,
    pub signature: ActionSignature,
    /// Lowercase `0x` hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_after: Option<u64>,
}

impl SignedAction {
    pub fn new(
        action: OrderAction,
        nonce: u64,
        signature: ActionSignature,
        vault_address: Option<Address>,
        expires_after: Option<u64>,
    ) -> Self {
        Self {
            action,
            nonce,
            signature,
            vault_address: vault_address.map(|a| format!("0x{}", hex::encode(a.as_slice()))),
            expires_after,
        }
    }

    pub fn to_value(&self) -> Result<Value, EncodingError> {
        serde_json::to_value(self).map_err(|e| EncodingError::Json(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, EncodingError> {
        serde_json::to_string(self).map_err(|e| EncodingError::Json(e.to_string()))
    }
}

/// Sends signed actions to the exchange.
pub trait OrderSender: Send + Sync {
    fn send(&self, action: SignedAction) -> BoxFuture<'_, SendResult>;

    /// Whether the transport can take a send right now. The pipeline
    /// refuses to send, retryably, while this is false.
    fn is_ready(&self) -> bool;
}

/// Arc wrapper for OrderSender trait objects.
pub type DynOrderSender = Arc<dyn OrderSender>;

/// Mock sender for tests: records every send and answers with a
/// programmable result.
#[derive(Debug)]
pub struct MockSender {
    sends: Mutex<Vec<SignedAction>>,
    next_result: Mutex<SendResult>,
    delay: Mutex<Option<Duration>>,
    ready: AtomicBool,
}

impl Default for MockSender {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSender {
    /// Accepts everything with one `Resting` status per order.
    pub fn new() -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            next_result: Mutex::new(SendResult::Accepted(Vec::new())),
            delay: Mutex::new(None),
            ready: AtomicBool::new(true),
        }
    }

    /// Result for all following sends. An `Accepted` with no statuses is
    /// expanded to one `Resting` status per order.
    pub fn set_next_result(&self, result: SendResult) {
        *self.next_result.lock() = result;
    }

    /// Hold each send for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn get_sends(&self) -> Vec<SignedAction> {
        self.sends.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().len()
    }

    pub fn clear_sends(&self) {
        self.sends.lock().clear();
    }
}

impl OrderSender for MockSender {
    fn send(&self, action: SignedAction) -> BoxFuture<'_, SendResult> {
        Box::pin(async move {
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let order_count = action.action.orders.len() as u64;
            self.sends.lock().push(action);
            let next = self.next_result.lock().clone();
            match next {
                SendResult::Accepted(statuses) if statuses.is_empty() => SendResult::Accepted(
                    (0..order_count).map(|i| OrderStatus::Resting { oid: i + 1 }).collect(),
                ),
                other => other,
            }
        })
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{OrderTypeWire, OrderWire};
    use hlx_core::Grouping;

    fn sample_action() -> OrderAction {
        OrderAction::new(
            vec![OrderWire {
                asset: 4,
                is_buy: true,
                limit_px: "1670.1".to_string(),
                sz: "0.0147".to_string(),
                reduce_only: false,
                order_type: OrderTypeWire::limit("Ioc"),
                cloid: None,
            }],
            Grouping::Na,
        )
    }

    fn sample_signed(vault: Option<Address>, expires: Option<u64>) -> SignedAction {
        SignedAction::new(
            sample_action(),
            1677777606040,
            ActionSignature {
                r: format!("0x{}", "ab".repeat(32)),
                s: format!("0x{}", "cd".repeat(32)),
                v: 28,
            },
            vault,
            expires,
        )
    }

    #[tokio::test]
    async fn test_mock_sender_records_sends() {
        let sender = MockSender::new();
        let result = sender.send(sample_signed(None, None)).await;
        assert_eq!(result, SendResult::Accepted(vec![OrderStatus::Resting { oid: 1 }]));
        assert_eq!(sender.send_count(), 1);
        sender.clear_sends();
        assert!(sender.get_sends().is_empty());
    }

    #[tokio::test]
    async fn test_mock_sender_returns_configured_result() {
        let sender = MockSender::new();
        sender.set_next_result(SendResult::Disconnected);
        let result = sender.send(sample_signed(None, None)).await;
        assert!(result.is_retryable());
        assert!(!result.is_success());
    }

    #[test]
    fn test_send_result_properties() {
        assert!(SendResult::Accepted(vec![]).is_success());
        assert!(SendResult::RateLimited.is_retryable());
        assert!(SendResult::Error("io".into()).is_retryable());
        assert!(!SendResult::Rejected("margin".into()).is_retryable());
        assert!(!SendResult::Rejected("margin".into()).is_success());
    }

    #[test]
    fn test_signed_action_json_shape() {
        let plain = sample_signed(None, None).to_value().unwrap();
        let keys: Vec<_> = plain.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["action", "nonce", "signature"]);
        assert_eq!(plain["signature"]["v"], 28);

        let full = sample_signed(Some(Address::repeat_byte(0x4a)), Some(1677777666040))
            .to_value()
            .unwrap();
        let keys: Vec<_> = full.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["action", "nonce", "signature", "vaultAddress", "expiresAfter"]);
        assert_eq!(full["vaultAddress"], "0x4a4a4a4a4a4a4a4a4a4a4a4a4a4a4a4a4a4a4a4a");
        assert_eq!(full["expiresAfter"], 1677777666040u64);
    }
}
