//! Basket types: an entry leg plus protective stop-loss / take-profit exits.

use std::fmt;

use chrono::{DateTime, Utc};
use hlx_core::{AssetInfo, OrderKind, OrderRequest, OrderSide, Price, Size, TimeInForce};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BasketError, BasketResult};

/// Exclusive upper bound on slippage; 10 000 bps would price a sell at zero.
pub const SLIPPAGE_BPS_LIMIT: u32 = 10_000;

/// Opaque basket identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasketId(String);

impl BasketId {
    pub fn new() -> Self {
        Self(format!("bkt-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BasketId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for BasketId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for BasketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Basket lifecycle.
///
/// `Pending -> Active -> Triggered -> Completed`, or any non-terminal
/// state `-> Cancelled`. A failed exit sends `Triggered` back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasketState {
    Pending,
    Active,
    Triggered,
    Cancelled,
    Completed,
}

impl BasketState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }
}

impl fmt::Display for BasketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Triggered => "triggered",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// How the entry leg is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntryKind {
    Limit {
        #[serde(default)]
        tif: TimeInForce,
    },
    /// IOC at the entry price moved by the slippage allowance.
    #[default]
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitKind {
    StopLoss,
    TakeProfit,
}

impl ExitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
        }
    }
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketConfig {
    pub symbol: String,
    /// Side of the entry leg. Exits trade the opposite side.
    pub side: OrderSide,
    pub entry_price: Price,
    pub size: Size,
    #[serde(default)]
    pub entry_kind: EntryKind,
    #[serde(default)]
    pub stop_loss: Option<Price>,
    #[serde(default)]
    pub take_profit: Option<Price>,
    /// Overrides the manager's default slippage for this basket.
    #[serde(default)]
    pub slippage_bps: Option<u32>,
}

impl BasketConfig {
    /// Check the entry and exit legs against each other and the asset rules.
    ///
    /// A long needs `stop_loss < entry_price < take_profit`, a short the
    /// mirror; at least one exit must be set.
    pub fn validate(&self, asset: &AssetInfo) -> BasketResult<()> {
        let invalid = |msg: String| Err(BasketError::InvalidConfig(msg));

        if self.symbol != asset.symbol {
            return invalid(format!(
                "symbol {} does not match asset {}",
                self.symbol, asset.symbol
            ));
        }
        if !self.entry_price.is_positive() {
            return invalid(format!("entry price must be positive, got {}", self.entry_price));
        }
        if !self.size.is_positive() {
            return invalid(format!("size must be positive, got {}", self.size));
        }
        if asset.round_size(self.size) != self.size {
            return invalid(format!(
                "size {} exceeds {} decimals for {}",
                self.size, asset.sz_decimals, asset.symbol
            ));
        }
        if let Some(bps) = self.slippage_bps {
            check_slippage_bps(bps).map_err(BasketError::InvalidConfig)?;
        }
        if self.stop_loss.is_none() && self.take_profit.is_none() {
            return invalid("at least one of stop_loss or take_profit is required".into());
        }

        let is_long = self.side.is_buy();
        if let Some(sl) = self.stop_loss {
            let ok = if is_long {
                sl < self.entry_price
            } else {
                sl > self.entry_price
            };
            if !sl.is_positive() || !ok {
                return invalid(format!(
                    "stop loss {sl} is on the wrong side of entry {} for a {} basket",
                    self.entry_price, self.side
                ));
            }
        }
        if let Some(tp) = self.take_profit {
            let ok = if is_long {
                tp > self.entry_price
            } else {
                tp < self.entry_price
            };
            if !tp.is_positive() || !ok {
                return invalid(format!(
                    "take profit {tp} is on the wrong side of entry {} for a {} basket",
                    self.entry_price, self.side
                ));
            }
        }
        Ok(())
    }

    pub fn exit_side(&self) -> OrderSide {
        self.side.opposite()
    }

    /// Exit condition met at `price`, stop-loss first.
    pub fn check_trigger(&self, price: Price) -> Option<ExitKind> {
        let is_long = self.side.is_buy();
        let sl_hit = self.stop_loss.is_some_and(|sl| {
            if is_long {
                price <= sl
            } else {
                price >= sl
            }
        });
        if sl_hit {
            return Some(ExitKind::StopLoss);
        }
        let tp_hit = self.take_profit.is_some_and(|tp| {
            if is_long {
                price >= tp
            } else {
                price <= tp
            }
        });
        tp_hit.then_some(ExitKind::TakeProfit)
    }

    /// Entry leg as an order request.
    pub fn entry_order(&self, asset: &AssetInfo, slippage_bps: u32) -> BasketResult<OrderRequest> {
        let is_buy = self.side.is_buy();
        let order = match self.entry_kind {
            EntryKind::Limit { tif } => OrderRequest::new(
                &self.symbol,
                self.side,
                self.size,
                asset.round_price(self.entry_price, is_buy),
                false,
                OrderKind::Limit { tif },
                None,
            )?,
            EntryKind::Market => OrderRequest::market(
                &self.symbol,
                self.side,
                self.size,
                worst_price(asset, self.entry_price, slippage_bps, is_buy),
            )?,
        };
        Ok(order)
    }

    /// Reduce-only exit at `reference` moved against us by `slippage_bps`.
    pub fn exit_order(
        &self,
        asset: &AssetInfo,
        reference: Price,
        slippage_bps: u32,
    ) -> BasketResult<OrderRequest> {
        let side = self.exit_side();
        let is_buy = side.is_buy();
        let worst = worst_price(asset, reference, slippage_bps, is_buy);
        Ok(OrderRequest::market(&self.symbol, side, self.size, worst)?.into_reduce_only())
    }
}

/// `reference` moved against us by `slippage_bps`, on the price grid and
/// never below one tick.
fn worst_price(asset: &AssetInfo, reference: Price, slippage_bps: u32, is_buy: bool) -> Price {
    asset
        .round_price(reference.offset_bps(slippage_bps, is_buy), is_buy)
        .max(asset.price_tick())
}

/// Slippage must leave a sell's worst price above zero.
pub fn check_slippage_bps(bps: u32) -> Result<(), String> {
    if bps >= SLIPPAGE_BPS_LIMIT {
        return Err(format!(
            "slippage_bps must be below {SLIPPAGE_BPS_LIMIT}, got {bps}"
        ));
    }
    Ok(())
}

/// The exit that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub kind: ExitKind,
    pub price: Price,
    pub at: DateTime<Utc>,
}

/// Last submission failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketFailure {
    pub message: String,
    /// False for validation, encoding and signature failures; these block
    /// automatic triggering until the basket is cancelled.
    pub retryable: bool,
}

/// Snapshot of one basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub id: BasketId,
    pub config: BasketConfig,
    pub state: BasketState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub trigger: Option<TriggerRecord>,
    pub last_error: Option<BasketFailure>,
    /// Nonce of the accepted exit action.
    pub exit_nonce: Option<u64>,
}

impl Basket {
    pub fn new(id: BasketId, config: BasketConfig) -> Self {
        let now = Utc::now();
        Self {
            id,
            config,
            state: BasketState::Pending,
            created_at: now,
            updated_at: now,
            trigger: None,
            last_error: None,
            exit_nonce: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn set_state(&mut self, state: BasketState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// Active and not blocked by a fatal failure.
    pub fn is_armed(&self) -> bool {
        self.state == BasketState::Active
            && self.last_error.as_ref().map_or(true, |e| e.retryable)
    }
}

/// A basket that left the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedBasket {
    pub basket: Basket,
    pub closed_at: DateTime<Utc>,
    /// Set when an exit submission finished after the basket was cancelled.
    pub late_outcome: Option<String>,
}

/// Lifecycle notifications broadcast by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasketEvent {
    Created { id: BasketId, symbol: String },
    Activated { id: BasketId },
    Triggered { id: BasketId, kind: ExitKind, price: Price },
    Completed { id: BasketId, nonce: u64 },
    SubmissionFailed { id: BasketId, message: String, retryable: bool },
    Cancelled { id: BasketId },
}
