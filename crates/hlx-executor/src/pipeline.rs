//! Order pipeline: requests -> action -> hash -> signature -> validated
//! payload -> sender.
//!
//! One pipeline is shared by every caller that signs for the same key, so
//! they all draw nonces from the same [`NonceManager`].

use std::sync::Arc;

use alloy::primitives::Address;
use hlx_core::{AssetTable, Grouping, OrderRequest};
use tracing::{debug, info, warn};

use crate::error::{ExecutorError, ExecutorResult};
use crate::hash::SigningInput;
use crate::nonce::NonceManager;
use crate::sender::{ActionSignature, DynOrderSender, OrderStatus, SendResult, SignedAction};
use crate::signer::Signer;
use crate::validator::validate;
use crate::wire::OrderAction;

/// Statuses of an accepted submission, one per order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub nonce: u64,
    pub statuses: Vec<OrderStatus>,
}

impl SubmitReport {
    /// First per-order error, if the exchange refused any order.
    pub fn first_error(&self) -> Option<&str> {
        self.statuses.iter().find_map(|s| match s {
            OrderStatus::Error(e) => Some(e.as_str()),
            _ => None,
        })
    }
}

pub struct OrderPipeline {
    assets: Arc<AssetTable>,
    signer: Signer,
    nonces: Arc<NonceManager>,
    sender: DynOrderSender,
    vault_address: Option<Address>,
    /// Signature validity window; `expiresAfter = nonce + window`.
    expires_after_ms: Option<u64>,
}

impl OrderPipeline {
    pub fn new(
        assets: Arc<AssetTable>,
        signer: Signer,
        nonces: Arc<NonceManager>,
        sender: DynOrderSender,
    ) -> Self {
        Self {
            assets,
            signer,
            nonces,
            sender,
            vault_address: None,
            expires_after_ms: None,
        }
    }

    /// Trade on behalf of `vault`.
    pub fn with_vault_address(mut self, vault: Address) -> Self {
        self.vault_address = Some(vault);
        self
    }

    pub fn with_expires_after(mut self, window_ms: u64) -> Self {
        self.expires_after_ms = Some(window_ms);
        self
    }

    pub fn assets(&self) -> &AssetTable {
        &self.assets
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    /// Resolve requests into an action.
    ///
    /// # Errors
    /// `ExecutorError::Encoding` if a symbol is not in the asset table.
    pub fn build_action(
        &self,
        orders: &[OrderRequest],
        grouping: Grouping,
    ) -> ExecutorResult<OrderAction> {
        Ok(OrderAction::from_requests(orders, grouping, &self.assets)?)
    }

    /// Take a nonce, hash, sign, and validate the resulting payload.
    ///
    /// # Errors
    /// Encoding, signing or signature-integrity failures, or a payload that
    /// fails validation. None of these are retryable.
    pub fn sign_action(&self, action: OrderAction) -> ExecutorResult<SignedAction> {
        let nonce = self.nonces.next();
        let expires_after = self.expires_after_ms.map(|w| nonce.saturating_add(w));

        let input = SigningInput {
            action,
            nonce,
            vault_address: self.vault_address,
            expires_after,
        };
        let action_hash = input.action_hash()?;
        let signature = self.signer.sign_hash(action_hash)?;

        let signed = SignedAction::new(
            input.action,
            nonce,
            ActionSignature::from(&signature),
            self.vault_address,
            expires_after,
        );

        let report = validate(&signed.to_value()?);
        if !report.is_valid() {
            warn!(%report, nonce, "signed payload failed validation");
            return Err(ExecutorError::Validation(report));
        }

        debug!(nonce, orders = signed.action.orders.len(), "action signed");
        Ok(signed)
    }

    /// Send an already-signed action.
    ///
    /// # Errors
    /// `ExecutorError::Submission` when the transport is not ready, on
    /// transport failure, or on exchange rejection.
    pub async fn submit_signed(&self, signed: SignedAction) -> ExecutorResult<SubmitReport> {
        let nonce = signed.nonce;
        if !self.sender.is_ready() {
            warn!(nonce, "sender not ready, action not sent");
            return Err(ExecutorError::Submission {
                message: "sender not ready".to_string(),
                retryable: true,
            });
        }
        match self.sender.send(signed).await {
            SendResult::Accepted(statuses) => {
                info!(nonce, statuses = statuses.len(), "action accepted");
                Ok(SubmitReport { nonce, statuses })
            }
            other => {
                let retryable = other.is_retryable();
                warn!(nonce, result = ?other, retryable, "action not accepted");
                Err(ExecutorError::Submission {
                    message: format!("{other:?}"),
                    retryable,
                })
            }
        }
    }

    /// Build, sign and send in one go.
    pub async fn submit_orders(
        &self,
        orders: &[OrderRequest],
        grouping: Grouping,
    ) -> ExecutorResult<SubmitReport> {
        let action = self.build_action(orders, grouping)?;
        let signed = self.sign_action(action)?;
        self.submit_signed(signed).await
    }
}

impl std::fmt::Debug for OrderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderPipeline")
            .field("signer", &self.signer)
            .field("assets", &self.assets.len())
            .field("vault_address", &self.vault_address)
            .field("expires_after_ms", &self.expires_after_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::MockSender;
    use crate::signer::{DigestSigner, KeyManager, SignerError};
    use alloy::primitives::{PrimitiveSignature, B256};
    use alloy::signers::local::PrivateKeySigner;
    use hlx_core::{AssetInfo, OrderSide, Price, Size, TimeInForce};
    use rust_decimal_macros::dec;

    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn assets() -> Arc<AssetTable> {
        Arc::new(AssetTable::from_assets([AssetInfo::new("ETH", 4, 4)]).unwrap())
    }

    fn pipeline_with(sender: Arc<MockSender>) -> OrderPipeline {
        let key = KeyManager::from_hex(TEST_PRIVATE_KEY, None).unwrap();
        OrderPipeline::new(
            assets(),
            Signer::new(key.into_digest_signer(), false),
            Arc::new(NonceManager::with_system_clock()),
            sender,
        )
    }

    fn eth_buy() -> OrderRequest {
        OrderRequest::limit(
            "ETH",
            OrderSide::Buy,
            Size::new(dec!(0.0147)),
            Price::new(dec!(1670.1)),
            TimeInForce::Ioc,
        )
        .unwrap()
    }

    struct SwappedKeySigner;

    impl DigestSigner for SwappedKeySigner {
        fn address(&self) -> Address {
            Address::repeat_byte(0x77)
        }

        fn sign_digest(&self, digest: &B256) -> Result<PrimitiveSignature, SignerError> {
            PrivateKeySigner::from_slice(&[0x22; 32])
                .unwrap()
                .sign_digest(digest)
        }
    }

    #[tokio::test]
    async fn test_submit_orders_sends_validated_payload() {
        let sender = Arc::new(MockSender::new());
        let pipeline = pipeline_with(sender.clone());

        let report = pipeline.submit_orders(&[eth_buy()], Grouping::Na).await.unwrap();
        assert_eq!(report.statuses, vec![OrderStatus::Resting { oid: 1 }]);
        assert!(report.first_error().is_none());

        let sends = sender.get_sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].nonce, report.nonce);
        assert!(validate(&sends[0].to_value().unwrap()).is_valid());
    }

    #[tokio::test]
    async fn test_nonces_increase_across_actions() {
        let sender = Arc::new(MockSender::new());
        let pipeline = pipeline_with(sender.clone());

        let a = pipeline.sign_action(pipeline.build_action(&[eth_buy()], Grouping::Na).unwrap()).unwrap();
        let b = pipeline.sign_action(pipeline.build_action(&[eth_buy()], Grouping::Na).unwrap()).unwrap();
        assert!(b.nonce > a.nonce);
    }

    #[test]
    fn test_vault_and_expiry_in_payload() {
        let vault = Address::repeat_byte(0x42);
        let pipeline = pipeline_with(Arc::new(MockSender::new()))
            .with_vault_address(vault)
            .with_expires_after(60_000);

        let signed = pipeline
            .sign_action(pipeline.build_action(&[eth_buy()], Grouping::Na).unwrap())
            .unwrap();
        assert_eq!(signed.expires_after, Some(signed.nonce + 60_000));
        assert_eq!(
            signed.vault_address.as_deref(),
            Some("0x4242424242424242424242424242424242424242")
        );
    }

    #[test]
    fn test_unknown_asset_is_encoding_error() {
        let pipeline = pipeline_with(Arc::new(MockSender::new()));
        let req = OrderRequest::market("DOGE", OrderSide::Buy, Size::new(dec!(1)), Price::new(dec!(1)))
            .unwrap();
        let err = pipeline.build_action(&[req], Grouping::Na).unwrap_err();
        assert!(matches!(err, ExecutorError::Encoding(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_integrity_failure_never_sends() {
        let sender = Arc::new(MockSender::new());
        let pipeline = OrderPipeline::new(
            assets(),
            Signer::new(Arc::new(SwappedKeySigner), true),
            Arc::new(NonceManager::with_system_clock()),
            sender.clone(),
        );

        let err = pipeline.submit_orders(&[eth_buy()], Grouping::Na).await.unwrap_err();
        assert!(matches!(err, ExecutorError::SignatureIntegrity { .. }));
        assert!(err.is_fatal());
        assert_eq!(sender.send_count(), 0);
    }

    #[tokio::test]
    async fn test_submission_failures_are_reported() {
        let sender = Arc::new(MockSender::new());
        let pipeline = pipeline_with(sender.clone());

        sender.set_next_result(SendResult::Disconnected);
        let err = pipeline.submit_orders(&[eth_buy()], Grouping::Na).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!err.is_fatal());

        sender.set_next_result(SendResult::Rejected("Insufficient margin".into()));
        let err = pipeline.submit_orders(&[eth_buy()], Grouping::Na).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Submission { retryable: false, .. }));
    }

    #[tokio::test]
    async fn test_unready_sender_is_not_used() {
        let sender = Arc::new(MockSender::new());
        let pipeline = pipeline_with(sender.clone());

        sender.set_ready(false);
        let err = pipeline.submit_orders(&[eth_buy()], Grouping::Na).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Submission { retryable: true, .. }));
        assert_eq!(sender.send_count(), 0);

        sender.set_ready(true);
        assert!(pipeline.submit_orders(&[eth_buy()], Grouping::Na).await.is_ok());
        assert_eq!(sender.send_count(), 1);
    }

    #[tokio::test]
    async fn test_order_level_error_surfaces_in_report() {
        let sender = Arc::new(MockSender::new());
        sender.set_next_result(SendResult::Accepted(vec![OrderStatus::Error(
            "Order could not immediately match".into(),
        )]));
        let pipeline = pipeline_with(sender);

        let report = pipeline.submit_orders(&[eth_buy()], Grouping::Na).await.unwrap();
        assert_eq!(report.first_error(), Some("Order could not immediately match"));
    }
}
