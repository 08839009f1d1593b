//! Core domain types for the hlx order-signing and basket engine.
//!
//! This crate provides the types every other crate speaks:
//! - `Price`, `Size`: Precision-safe decimal newtypes with canonical wire strings
//! - `OrderRequest`, `OrderKind`: Validated, immutable trading intent
//! - `AssetTable`: Fixed symbol -> asset index table shared with the exchange
//! - `Grouping`, `TimeInForce`, `Tpsl`: Wire-level enums

pub mod decimal;
pub mod error;
pub mod market;
pub mod order;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use market::{AssetId, AssetInfo, AssetTable, MAX_PERP_DECIMALS, MAX_SIG_FIGS};
pub use order::{
    ClientOrderId, Grouping, OrderKind, OrderRequest, OrderSide, TimeInForce, Tpsl,
};
