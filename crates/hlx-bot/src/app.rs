//! Main application orchestration.
//!
//! Builds the signing pipeline from configuration and drives the basket
//! manager from a newline-delimited JSON price feed:
//!
//! ```text
//! {"symbol":"ETH","price":"1890.5"}
//! ```

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use hlx_basket::{
    global, spawn_basket_manager, BasketId, BasketManagerHandle, BasketState, ClosedBasket,
};
use hlx_core::{Grouping, OrderRequest, Price};
use hlx_executor::{
    DynOrderSender, ExecutorError, HttpSender, KeyManager, NonceRegistry, OrderPipeline, SignedAction, Signer,
    SubmitReport,
};
use hlx_telemetry::Metrics;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;

/// One line of the price feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub price: Price,
}

/// What a `run` did, for the final log line.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub ticks: u64,
    pub rejected_lines: u64,
    pub live: usize,
    pub closed: Vec<ClosedBasket>,
}

pub struct Application {
    config: AppConfig,
    pipeline: Arc<OrderPipeline>,
    nonces: NonceRegistry,
}

impl Application {
    /// Load the key from the configured source and connect the HTTP sender.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let key = KeyManager::load(
            &config.signing.key_source(),
            config.signing.expected_address()?,
        )?;
        let sender = HttpSender::new(config.network.api_url(), config.network.request_timeout())?;
        info!(
            address = %key.address(),
            url = %sender.exchange_url(),
            mainnet = config.network.is_mainnet,
            "signer ready"
        );
        Self::with_sender(config, key, Arc::new(sender))
    }

    /// Build with an explicit key and transport.
    pub fn with_sender(
        config: AppConfig,
        key: KeyManager,
        sender: DynOrderSender,
    ) -> AppResult<Self> {
        let assets = Arc::new(config.asset_table()?);
        let nonces = NonceRegistry::default();
        let signer = Signer::new(key.into_digest_signer(), config.network.is_mainnet);

        let mut pipeline =
            OrderPipeline::new(assets, signer.clone(), nonces.for_signer(signer.address()), sender);
        if let Some(vault) = config.signing.vault_address()? {
            pipeline = pipeline.with_vault_address(vault);
        }
        if let Some(window) = config.signing.expires_after_ms {
            pipeline = pipeline.with_expires_after(window);
        }

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            nonces,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn signer_address(&self) -> Address {
        self.pipeline.signer_address()
    }

    /// Last nonce handed out for this signer.
    pub fn last_nonce(&self) -> u64 {
        self.nonces.for_signer(self.signer_address()).last()
    }

    /// Sign one order without sending it.
    pub fn sign(&self, order: &OrderRequest) -> AppResult<SignedAction> {
        let action = self
            .pipeline
            .build_action(std::slice::from_ref(order), Grouping::Na)?;
        self.pipeline.sign_action(action).map_err(|e| {
            match e {
                ExecutorError::SignatureIntegrity { .. } => Metrics::signature_integrity_failure(),
                ExecutorError::Validation(_) => Metrics::validation_failure(),
                _ => {}
            }
            e.into()
        })
    }

    /// Send an already-signed order.
    pub async fn submit(&self, signed: SignedAction) -> AppResult<SubmitReport> {
        match self.pipeline.submit_signed(signed).await {
            Ok(report) => {
                let outcome = if report.first_error().is_some() {
                    "rejected"
                } else {
                    "accepted"
                };
                Metrics::submission("cli", outcome);
                Ok(report)
            }
            Err(e) => {
                Metrics::submission("cli", if e.is_retryable() { "retryable" } else { "rejected" });
                Err(e.into())
            }
        }
    }

    pub fn spawn_manager(&self) -> (BasketManagerHandle, JoinHandle<()>) {
        spawn_basket_manager(Arc::clone(&self.pipeline), self.config.manager_config())
    }

    /// Register the baskets declared in the config.
    pub async fn load_baskets(&self, handle: &BasketManagerHandle) -> AppResult<Vec<BasketId>> {
        let mut ids = Vec::with_capacity(self.config.baskets.len());
        for spec in &self.config.baskets {
            let id = handle.create_basket(spec.config.clone()).await?;
            if spec.submit_entry {
                handle.activate_basket(&id).await?;
            } else {
                handle.on_entry_filled(&id).await?;
            }
            info!(basket = %id, symbol = %spec.config.symbol, submit_entry = spec.submit_entry, "basket loaded");
            ids.push(id);
        }
        Ok(ids)
    }

    /// Forward every tick line to the manager until EOF.
    ///
    /// Malformed lines are logged and skipped. Returns `(ticks, rejected)`.
    pub async fn feed_ticks<R>(&self, handle: &BasketManagerHandle, input: R) -> AppResult<(u64, u64)>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut ticks = 0u64;
        let mut rejected = 0u64;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<PriceTick>(line) {
                Ok(tick) => {
                    handle.on_price_tick(&tick.symbol, tick.price).await?;
                    ticks += 1;
                }
                Err(e) => {
                    warn!(error = %e, line, "skipping malformed tick");
                    rejected += 1;
                }
            }
        }
        debug!(ticks, rejected, "tick input ended");
        Ok((ticks, rejected))
    }

    /// Wait until no basket has an exit in flight, or `timeout` passes.
    pub async fn drain(handle: &BasketManagerHandle, timeout: Duration) -> bool {
        let poll = async {
            loop {
                let in_flight = handle
                    .get_all_baskets()
                    .await
                    .iter()
                    .filter(|b| b.state == BasketState::Triggered)
                    .count();
                if in_flight == 0 {
                    return;
                }
                debug!(in_flight, "waiting for exit submissions");
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }

    /// Run the basket manager against `input` until it ends or Ctrl-C.
    ///
    /// Installs the manager as the process-wide instance for the duration.
    pub async fn run<R>(&self, input: R) -> AppResult<RunSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let (handle, join) = self.spawn_manager();
        global::install(handle.clone())?;

        let result = self.run_with(&handle, input).await;

        global::teardown();
        handle.shutdown().await;
        if let Err(e) = join.await {
            warn!(error = %e, "basket manager task failed");
        }
        result
    }

    async fn run_with<R>(&self, handle: &BasketManagerHandle, input: R) -> AppResult<RunSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        self.load_baskets(handle).await?;

        let (ticks, rejected_lines) = tokio::select! {
            fed = self.feed_ticks(handle, input) => fed?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping tick ingestion");
                (0, 0)
            }
        };

        let timeout = Duration::from_millis(self.config.basket.drain_timeout_ms);
        if !Self::drain(handle, timeout).await {
            warn!(?timeout, "exit submissions still in flight at shutdown");
        }

        let summary = RunSummary {
            ticks,
            rejected_lines,
            live: handle.get_all_baskets().await.len(),
            closed: handle.recent_closed().await,
        };
        info!(
            ticks = summary.ticks,
            rejected_lines = summary.rejected_lines,
            live = summary.live,
            closed = summary.closed.len(),
            "run finished"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BasketSpec;
    use crate::error::AppError;
    use hlx_basket::{BasketConfig, EntryKind};
    use hlx_core::{AssetInfo, OrderSide, Size, TimeInForce};
    use hlx_executor::{validate, MockSender, SendResult};
    use rust_decimal_macros::dec;

    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn config(baskets: Vec<BasketSpec>) -> AppConfig {
        AppConfig {
            assets: vec![AssetInfo::new("ETH", 4, 4)],
            baskets,
            ..Default::default()
        }
    }

    fn guard(submit_entry: bool) -> BasketSpec {
        BasketSpec {
            config: BasketConfig {
                symbol: "ETH".into(),
                side: OrderSide::Buy,
                entry_price: Price::new(dec!(2000)),
                size: Size::new(dec!(0.5)),
                entry_kind: EntryKind::Market,
                stop_loss: Some(Price::new(dec!(1900))),
                take_profit: None,
                slippage_bps: None,
            },
            submit_entry,
        }
    }

    fn app(config: AppConfig, sender: Arc<MockSender>) -> Application {
        let key = KeyManager::from_hex(TEST_PRIVATE_KEY, None).unwrap();
        Application::with_sender(config, key, sender).unwrap()
    }

    #[test]
    fn test_sign_produces_valid_payload() {
        let app = app(config(vec![]), Arc::new(MockSender::new()));
        let order = OrderRequest::limit(
            "ETH",
            OrderSide::Buy,
            Size::new(dec!(0.1)),
            Price::new(dec!(1800)),
            TimeInForce::Gtc,
        )
        .unwrap();

        let signed = app.sign(&order).unwrap();
        assert!(validate(&signed.to_value().unwrap()).is_valid());
        assert_eq!(app.last_nonce(), signed.nonce);
    }

    #[test]
    fn test_sign_unknown_symbol() {
        let app = app(config(vec![]), Arc::new(MockSender::new()));
        let order =
            OrderRequest::market("DOGE", OrderSide::Buy, Size::new(dec!(1)), Price::new(dec!(1)))
                .unwrap();
        assert!(matches!(app.sign(&order), Err(AppError::Executor(_))));
    }

    #[tokio::test]
    async fn test_submit_maps_rejection() {
        let sender = Arc::new(MockSender::new());
        sender.set_next_result(SendResult::Rejected("Insufficient margin".into()));
        let app = app(config(vec![]), sender);
        let order = OrderRequest::limit(
            "ETH",
            OrderSide::Sell,
            Size::new(dec!(0.1)),
            Price::new(dec!(2100)),
            TimeInForce::Alo,
        )
        .unwrap();

        let signed = app.sign(&order).unwrap();
        assert!(matches!(app.submit(signed).await, Err(AppError::Executor(_))));
    }

    #[tokio::test]
    async fn test_feed_ticks_skips_malformed_lines() {
        let sender = Arc::new(MockSender::new());
        let app = app(config(vec![guard(false)]), sender.clone());
        let (handle, _join) = app.spawn_manager();
        app.load_baskets(&handle).await.unwrap();

        let input: &[u8] = b"{\"symbol\":\"ETH\",\"price\":\"1950\"}\nnot json\n\n{\"symbol\":\"ETH\",\"price\":\"1890\"}\n";
        let (ticks, rejected) = app.feed_ticks(&handle, input).await.unwrap();
        assert_eq!((ticks, rejected), (2, 1));

        assert!(Application::drain(&handle, Duration::from_secs(5)).await);
        assert!(handle.get_all_baskets().await.is_empty());
        assert_eq!(sender.send_count(), 1);
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let sender = Arc::new(MockSender::new());
        let app = app(config(vec![guard(true), guard(false)]), sender.clone());

        let input: &[u8] = b"{\"symbol\":\"ETH\",\"price\":\"1980\"}\n{\"symbol\":\"ETH\",\"price\":1899.5}\n";
        let summary = app.run(input).await.unwrap();

        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.live, 0);
        assert_eq!(summary.closed.len(), 2);
        assert!(summary
            .closed
            .iter()
            .all(|c| c.basket.state == BasketState::Completed));
        // One entry plus two exits.
        assert_eq!(sender.send_count(), 3);
        assert!(global::global().is_none());
    }
}
