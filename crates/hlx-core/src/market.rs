//! Asset identification and exchange precision rules.
//!
//! The exchange addresses assets by integer index, not by symbol. The
//! symbol -> index table is fixed configuration shared with the exchange;
//! a symbol missing from it is an error, never a default index.

use crate::decimal::{Price, Size};
use crate::error::{CoreError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Maximum significant figures accepted in a non-integer price.
pub const MAX_SIG_FIGS: u32 = 5;

/// Decimal budget shared by price and size on perp markets:
/// price decimals may not exceed `MAX_PERP_DECIMALS - sz_decimals`.
pub const MAX_PERP_DECIMALS: u32 = 6;

/// Exchange asset index.
///
/// Builder-deployed perp dexes use `100000 + dex * 10000 + index`,
/// e.g. dex 1, index 27 is 110027.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u32);

impl AssetId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the asset table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub symbol: String,
    pub index: AssetId,
    pub sz_decimals: u32,
}

impl AssetInfo {
    pub fn new(symbol: impl Into<String>, index: u32, sz_decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            index: AssetId(index),
            sz_decimals,
        }
    }

    pub fn max_price_decimals(&self) -> u32 {
        MAX_PERP_DECIMALS.saturating_sub(self.sz_decimals)
    }

    /// Round `price` to the exchange's price rules, moving toward the
    /// aggressive side: up for buys, down for sells.
    pub fn round_price(&self, price: Price, is_buy: bool) -> Price {
        let strategy = if is_buy {
            RoundingStrategy::AwayFromZero
        } else {
            RoundingStrategy::ToZero
        };
        self.round_price_with(price, strategy)
    }

    /// Round `price` to at most five significant figures and
    /// `max_price_decimals()` decimals. Integer prices are always valid,
    /// however many digits they carry.
    pub fn round_price_with(&self, price: Price, strategy: RoundingStrategy) -> Price {
        let value = price.inner();
        if value.is_zero() {
            return price;
        }
        let magnitude = magnitude(value);
        let sig_fig_scale = (MAX_SIG_FIGS as i32 - magnitude - 1).max(0) as u32;
        let scale = sig_fig_scale.min(self.max_price_decimals());
        Price::new(value.round_dp_with_strategy(scale, strategy).normalize())
    }

    /// Floor `size` to `sz_decimals`.
    pub fn round_size(&self, size: Size) -> Size {
        Size::new(
            size.inner()
                .round_dp_with_strategy(self.sz_decimals, RoundingStrategy::ToZero)
                .normalize(),
        )
    }

    /// Smallest positive price the exchange accepts for this asset.
    pub fn price_tick(&self) -> Price {
        Price::new(Decimal::new(1, self.max_price_decimals()))
    }
}

/// Power of ten of the leading digit: 12345 -> 4, 1.5 -> 0, 0.00123 -> -3.
fn magnitude(value: Decimal) -> i32 {
    let ten = Decimal::TEN;
    let mut v = value.abs();
    let mut m = 0;
    if v >= Decimal::ONE {
        while v >= ten {
            v /= ten;
            m += 1;
        }
    } else {
        while v < Decimal::ONE {
            v *= ten;
            m -= 1;
        }
    }
    m
}

/// Fixed symbol -> asset table.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    by_symbol: HashMap<String, AssetInfo>,
}

impl AssetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table, rejecting duplicate symbols or indices.
    pub fn from_assets(assets: impl IntoIterator<Item = AssetInfo>) -> Result<Self> {
        let mut table = Self::new();
        for info in assets {
            table.insert(info)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, info: AssetInfo) -> Result<()> {
        if info.symbol.trim().is_empty() {
            return Err(CoreError::InvalidConfig("asset symbol is empty".into()));
        }
        if info.sz_decimals > MAX_PERP_DECIMALS {
            return Err(CoreError::InvalidConfig(format!(
                "{}: sz_decimals {} exceeds {MAX_PERP_DECIMALS}",
                info.symbol, info.sz_decimals
            )));
        }
        if self.by_symbol.contains_key(&info.symbol) {
            return Err(CoreError::InvalidConfig(format!(
                "duplicate asset symbol {}",
                info.symbol
            )));
        }
        if let Some(other) = self.by_symbol.values().find(|a| a.index == info.index) {
            return Err(CoreError::InvalidConfig(format!(
                "asset index {} used by both {} and {}",
                info.index, other.symbol, info.symbol
            )));
        }
        self.by_symbol.insert(info.symbol.clone(), info);
        Ok(())
    }

    /// Look up a symbol.
    ///
    /// # Errors
    /// `CoreError::UnknownAsset` if the symbol is not in the table.
    pub fn resolve(&self, symbol: &str) -> Result<&AssetInfo> {
        self.by_symbol
            .get(symbol)
            .ok_or_else(|| CoreError::UnknownAsset(symbol.to_string()))
    }

    pub fn index_of(&self, symbol: &str) -> Result<AssetId> {
        self.resolve(symbol).map(|info| info.index)
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetInfo> {
        self.by_symbol.values()
    }
}
