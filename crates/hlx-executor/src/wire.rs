//! Wire format types and the canonical action encoder.
//!
//! The action is hashed as MessagePack in map form. Keys are emitted in
//! struct declaration order, which must match the exchange's reference
//! encoder exactly; reordering a field changes the hash. `Option` fields
//! are skipped when `None`, never written as nil.

use hlx_core::{AssetTable, CoreError, Grouping, OrderKind, OrderRequest};
use serde::Serialize;

use crate::error::EncodingError;

/// Order placement action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAction {
    #[serde(rename = "type")]
    pub action_type: String,

    /// Order matters: it is part of the signed payload.
    pub orders: Vec<OrderWire>,

    /// "na", "normalTpsl" or "positionTpsl".
    pub grouping: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderInfo>,
}

impl OrderAction {
    pub fn new(orders: Vec<OrderWire>, grouping: Grouping) -> Self {
        Self {
            action_type: "order".to_string(),
            orders,
            grouping: grouping.as_wire().to_string(),
            builder: None,
        }
    }

    /// Attach a builder fee.
    pub fn with_builder(mut self, builder: BuilderInfo) -> Self {
        self.builder = Some(builder);
        self
    }

    /// Resolve every request against `assets` and build the action.
    pub fn from_requests(
        requests: &[OrderRequest],
        grouping: Grouping,
        assets: &AssetTable,
    ) -> Result<Self, EncodingError> {
        let orders = requests
            .iter()
            .map(|r| OrderWire::from_request(r, assets))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(orders, grouping))
    }
}

/// Builder fee attachment: `b` is the builder address, `f` the fee in
/// tenths of a basis point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuilderInfo {
    #[serde(rename = "b")]
    pub address: String,
    #[serde(rename = "f")]
    pub fee: u64,
}

/// One order on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWire {
    #[serde(rename = "a")]
    pub asset: u32,

    #[serde(rename = "b")]
    pub is_buy: bool,

    #[serde(rename = "p")]
    pub limit_px: String,

    #[serde(rename = "s")]
    pub sz: String,

    #[serde(rename = "r")]
    pub reduce_only: bool,

    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,

    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
}

impl OrderWire {
    /// Convert a validated request, resolving its symbol through `assets`.
    ///
    /// # Errors
    /// `EncodingError::UnknownAsset` if the symbol is not in the table.
    pub fn from_request(req: &OrderRequest, assets: &AssetTable) -> Result<Self, EncodingError> {
        let asset = assets.index_of(req.asset()).map_err(|e| match e {
            CoreError::UnknownAsset(symbol) => EncodingError::UnknownAsset(symbol),
            other => EncodingError::UnknownAsset(other.to_string()),
        })?;

        let order_type = match req.kind() {
            OrderKind::Limit { tif } => OrderTypeWire::limit(tif.as_wire()),
            OrderKind::Market => OrderTypeWire::limit("Ioc"),
            OrderKind::Trigger {
                trigger_price,
                is_market,
                tpsl,
            } => OrderTypeWire::Trigger {
                trigger: TriggerOrderType {
                    is_market: *is_market,
                    trigger_px: trigger_price.to_wire(),
                    tpsl: tpsl.as_wire().to_string(),
                },
            },
        };

        Ok(Self {
            asset: asset.index(),
            is_buy: req.is_buy(),
            limit_px: req.limit_price().to_wire(),
            sz: req.size().to_wire(),
            reduce_only: req.reduce_only(),
            order_type,
            cloid: req.cloid().map(|c| c.as_str().to_string()),
        })
    }
}

/// Order type discriminator: `{"limit":{...}}` or `{"trigger":{...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OrderTypeWire {
    Limit { limit: LimitOrderType },
    Trigger { trigger: TriggerOrderType },
}

impl OrderTypeWire {
    pub fn limit(tif: &str) -> Self {
        Self::Limit {
            limit: LimitOrderType {
                tif: tif.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitOrderType {
    /// "Alo", "Ioc" or "Gtc".
    pub tif: String,
}

/// Field order is isMarket, triggerPx, tpsl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerOrderType {
    #[serde(rename = "isMarket")]
    pub is_market: bool,

    #[serde(rename = "triggerPx")]
    pub trigger_px: String,

    pub tpsl: String,
}

/// Encode an action into the exchange's canonical MessagePack bytes.
///
/// # Errors
/// `EncodingError::EmptyAction` for an action without orders.
pub fn encode(action: &OrderAction) -> Result<Vec<u8>, EncodingError> {
    if action.orders.is_empty() {
        return Err(EncodingError::EmptyAction);
    }
    rmp_serde::to_vec_named(action).map_err(|e| EncodingError::Msgpack(e.to_string()))
}
