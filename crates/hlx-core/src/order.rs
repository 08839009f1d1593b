//! Order intent types.
//!
//! `OrderRequest` is the caller-facing description of one order. It is
//! validated once at construction and cannot be mutated afterwards, so the
//! signing pipeline never has to re-check its shape.

use crate::decimal::{Price, Size};
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    #[inline]
    pub fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Time-in-force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Add-liquidity-only (post only).
    Alo,
    /// Immediate-or-cancel.
    #[default]
    Ioc,
    /// Good-til-cancelled.
    Gtc,
}

impl TimeInForce {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Alo => "Alo",
            Self::Ioc => "Ioc",
            Self::Gtc => "Gtc",
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Take-profit or stop-loss flavour of a trigger order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tpsl {
    Tp,
    Sl,
}

impl Tpsl {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Tp => "tp",
            Self::Sl => "sl",
        }
    }
}

impl fmt::Display for Tpsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Order grouping of an action.
///
/// `NormalTpsl` ties trigger legs to a parent order, `PositionTpsl` ties
/// them to the whole position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Grouping {
    #[default]
    Na,
    NormalTpsl,
    PositionTpsl,
}

impl Grouping {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Na => "na",
            Self::NormalTpsl => "normalTpsl",
            Self::PositionTpsl => "positionTpsl",
        }
    }
}

/// Closed set of order kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OrderKind {
    Limit {
        #[serde(default)]
        tif: TimeInForce,
    },
    /// Sent as an immediate-or-cancel limit at the request's limit price,
    /// which the caller sets to its worst acceptable fill.
    Market,
    Trigger {
        trigger_price: Price,
        is_market: bool,
        tpsl: Tpsl,
    },
}

/// Client order ID: 16 bytes rendered as `0x` + 32 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new random client order ID.
    pub fn new() -> Self {
        Self(format!("0x{}", Uuid::new_v4().simple()))
    }

    /// Parse an existing ID, accepting either hex case.
    pub fn parse(s: &str) -> Result<Self> {
        let hex = s
            .strip_prefix("0x")
            .ok_or_else(|| CoreError::InvalidCloid(format!("{s}: missing 0x prefix")))?;
        if hex.len() != 32 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidCloid(format!(
                "{s}: expected 32 hex characters"
            )));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ClientOrderId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ClientOrderId> for String {
    fn from(id: ClientOrderId) -> Self {
        id.0
    }
}

/// A validated, immutable order request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    asset: String,
    side: OrderSide,
    size: Size,
    limit_price: Price,
    reduce_only: bool,
    kind: OrderKind,
    cloid: Option<ClientOrderId>,
}

impl OrderRequest {
    /// Validate and build a request.
    ///
    /// # Errors
    /// `CoreError::InvalidOrder` on an empty symbol, a non-positive size,
    /// limit price or trigger price.
    pub fn new(
        asset: impl Into<String>,
        side: OrderSide,
        size: Size,
        limit_price: Price,
        reduce_only: bool,
        kind: OrderKind,
        cloid: Option<ClientOrderId>,
    ) -> Result<Self> {
        let asset = asset.into();
        if asset.trim().is_empty() {
            return Err(CoreError::InvalidOrder("asset symbol is empty".into()));
        }
        if !size.is_positive() {
            return Err(CoreError::InvalidOrder(format!(
                "size must be positive, got {size}"
            )));
        }
        if !limit_price.is_positive() {
            return Err(CoreError::InvalidOrder(format!(
                "limit price must be positive, got {limit_price}"
            )));
        }
        if let OrderKind::Trigger { trigger_price, .. } = kind {
            if !trigger_price.is_positive() {
                return Err(CoreError::InvalidOrder(format!(
                    "trigger price must be positive, got {trigger_price}"
                )));
            }
        }

        Ok(Self {
            asset,
            side,
            size,
            limit_price,
            reduce_only,
            kind,
            cloid,
        })
    }

    /// Limit order shortcut.
    pub fn limit(
        asset: impl Into<String>,
        side: OrderSide,
        size: Size,
        price: Price,
        tif: TimeInForce,
    ) -> Result<Self> {
        Self::new(asset, side, size, price, false, OrderKind::Limit { tif }, None)
    }

    /// Market order shortcut; `worst_price` bounds the fill.
    pub fn market(
        asset: impl Into<String>,
        side: OrderSide,
        size: Size,
        worst_price: Price,
    ) -> Result<Self> {
        Self::new(asset, side, size, worst_price, false, OrderKind::Market, None)
    }

    /// Copy of this request with reduce-only set.
    pub fn into_reduce_only(self) -> Self {
        Self {
            reduce_only: true,
            ..self
        }
    }

    /// Copy of this request carrying `cloid`.
    pub fn with_cloid(self, cloid: ClientOrderId) -> Self {
        Self {
            cloid: Some(cloid),
            ..self
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn is_buy(&self) -> bool {
        self.side.is_buy()
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn limit_price(&self) -> Price {
        self.limit_price
    }

    pub fn reduce_only(&self) -> bool {
        self.reduce_only
    }

    pub fn kind(&self) -> &OrderKind {
        &self.kind
    }

    pub fn cloid(&self) -> Option<&ClientOrderId> {
        self.cloid.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn px(v: rust_decimal::Decimal) -> Price {
        Price::new(v)
    }

    fn sz(v: rust_decimal::Decimal) -> Size {
        Size::new(v)
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
        assert!(OrderSide::Buy.is_buy());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(TimeInForce::Alo.as_wire(), "Alo");
        assert_eq!(TimeInForce::default().as_wire(), "Ioc");
        assert_eq!(Tpsl::Sl.as_wire(), "sl");
        assert_eq!(Grouping::Na.as_wire(), "na");
        assert_eq!(Grouping::NormalTpsl.as_wire(), "normalTpsl");
        assert_eq!(Grouping::PositionTpsl.as_wire(), "positionTpsl");
    }

    #[test]
    fn test_cloid_format() {
        let id = ClientOrderId::new();
        assert_eq!(id.as_str().len(), 34);
        assert!(id.as_str().starts_with("0x"));
        assert_ne!(id, ClientOrderId::new());
    }

    #[test]
    fn test_cloid_parse() {
        let id = ClientOrderId::parse("0x0DE3E244A8F44FC28A6B7BC852D66D19").unwrap();
        assert_eq!(id.as_str(), "0x0de3e244a8f44fc28a6b7bc852d66d19");
        assert!(ClientOrderId::parse("0de3e244a8f44fc28a6b7bc852d66d19").is_err());
        assert!(ClientOrderId::parse("0x1234").is_err());
        assert!(ClientOrderId::parse("0xzze3e244a8f44fc28a6b7bc852d66d19").is_err());
    }

    #[test]
    fn test_cloid_serde_validates() {
        let ok: ClientOrderId =
            serde_json::from_str("\"0x0de3e244a8f44fc28a6b7bc852d66d19\"").unwrap();
        assert_eq!(ok.as_str(), "0x0de3e244a8f44fc28a6b7bc852d66d19");
        assert!(serde_json::from_str::<ClientOrderId>("\"order_1\"").is_err());
    }

    #[test]
    fn test_request_rejects_bad_input() {
        let bad_size = OrderRequest::limit("ETH", OrderSide::Buy, sz(dec!(0)), px(dec!(10)), TimeInForce::Gtc);
        assert!(matches!(bad_size, Err(CoreError::InvalidOrder(_))));

        let bad_price = OrderRequest::market("ETH", OrderSide::Sell, sz(dec!(1)), px(dec!(-1)));
        assert!(matches!(bad_price, Err(CoreError::InvalidOrder(_))));

        let empty = OrderRequest::market("  ", OrderSide::Sell, sz(dec!(1)), px(dec!(1)));
        assert!(matches!(empty, Err(CoreError::InvalidOrder(_))));

        let bad_trigger = OrderRequest::new(
            "ETH",
            OrderSide::Sell,
            sz(dec!(1)),
            px(dec!(1900)),
            true,
            OrderKind::Trigger {
                trigger_price: Price::ZERO,
                is_market: true,
                tpsl: Tpsl::Sl,
            },
            None,
        );
        assert!(matches!(bad_trigger, Err(CoreError::InvalidOrder(_))));
    }

    #[test]
    fn test_request_builders_keep_fields() {
        let cloid = ClientOrderId::new();
        let req = OrderRequest::market("BTC", OrderSide::Sell, sz(dec!(0.5)), px(dec!(49000)))
            .unwrap()
            .into_reduce_only()
            .with_cloid(cloid.clone());

        assert_eq!(req.asset(), "BTC");
        assert!(!req.is_buy());
        assert!(req.reduce_only());
        assert_eq!(req.kind(), &OrderKind::Market);
        assert_eq!(req.cloid(), Some(&cloid));
        assert_eq!(req.size().inner(), dec!(0.5));
    }

    #[test]
    fn test_order_kind_from_config() {
        let kind: OrderKind = serde_json::from_str(r#"{"type":"limit","tif":"Gtc"}"#).unwrap();
        assert_eq!(kind, OrderKind::Limit { tif: TimeInForce::Gtc });
        let kind: OrderKind = serde_json::from_str(r#"{"type":"market"}"#).unwrap();
        assert_eq!(kind, OrderKind::Market);
    }
}
