//! Split order planner.
//!
//! Spreads a parent quantity over `split_count` limit prices evenly spaced
//! between `min_price` and `max_price`. Leg `i` is priced at
//! `min + i * (max - min) / (n - 1)`; the last leg is pinned to `max`.
//! With asset precision the range is first narrowed to the nearest valid
//! prices inside it, so no leg ever leaves `[min_price, max_price]`.
//!
//! # Weighting
//!
//! | Bias    | Weight of leg `i` (0-based, ascending price) |
//! |---------|----------------------------------------------|
//! | `Mid`   | `1`                                          |
//! | `Upper` | `i + 1`                                      |
//! | `Lower` | `n - i`                                      |
//!
//! Each leg gets `total * w_i / sum(w)` rounded down, and the rounding
//! residual goes to the heaviest leg, so leg quantities always sum to the
//! requested total exactly.

use hlx_core::{AssetInfo, OrderRequest, OrderSide, Price, Size, TimeInForce};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

pub const MIN_SPLIT_COUNT: usize = 2;
pub const MAX_SPLIT_COUNT: usize = 10;

/// Decimals kept on leg quantities when no asset precision is given.
const UNROUNDED_QUANTITY_SCALE: u32 = 12;

/// Which end of the price range receives more quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleBias {
    /// More size near `min_price`.
    Lower,
    #[default]
    Mid,
    /// More size near `max_price`.
    Upper,
}

impl ScaleBias {
    fn weight(&self, index: usize, count: usize) -> u64 {
        match self {
            Self::Mid => 1,
            Self::Upper => (index + 1) as u64,
            Self::Lower => (count - index) as u64,
        }
    }

    /// Index of the leg that absorbs the rounding residual.
    fn heaviest(&self, count: usize) -> usize {
        match self {
            Self::Lower => 0,
            Self::Mid | Self::Upper => count - 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlanRequest {
    pub min_price: Price,
    pub max_price: Price,
    pub split_count: usize,
    pub scale_bias: ScaleBias,
    pub total_quantity: Size,
    asset: Option<AssetInfo>,
}

impl SplitPlanRequest {
    pub fn new(
        min_price: Price,
        max_price: Price,
        split_count: usize,
        scale_bias: ScaleBias,
        total_quantity: Size,
    ) -> Self {
        Self {
            min_price,
            max_price,
            split_count,
            scale_bias,
            total_quantity,
            asset: None,
        }
    }

    /// Round leg prices and sizes to `asset`'s exchange precision.
    pub fn with_asset(mut self, asset: &AssetInfo) -> Self {
        self.asset = Some(asset.clone());
        self
    }

    fn check(&self) -> PlanResult<()> {
        if !(MIN_SPLIT_COUNT..=MAX_SPLIT_COUNT).contains(&self.split_count) {
            return Err(PlanError::InvalidSplitCount(self.split_count));
        }
        for price in [self.min_price, self.max_price] {
            if !price.is_positive() {
                return Err(PlanError::NonPositivePrice(price));
            }
        }
        if self.min_price > self.max_price {
            return Err(PlanError::InvalidPriceRange {
                min: self.min_price,
                max: self.max_price,
            });
        }
        if !self.total_quantity.is_positive() {
            return Err(PlanError::NonPositiveQuantity(self.total_quantity));
        }
        if let Some(asset) = &self.asset {
            if asset.round_size(self.total_quantity) != self.total_quantity {
                return Err(PlanError::QuantityPrecision {
                    quantity: self.total_quantity,
                    sz_decimals: asset.sz_decimals,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitLeg {
    pub price: Price,
    pub quantity: Size,
}

/// Compute the legs of a split order, ordered by ascending price.
///
/// # Errors
/// `PlanError` for a split count outside `2..=10`, an inverted or
/// non-positive price range, a non-positive total, or (with asset
/// precision) a range holding no valid price, a total off the lot grid or
/// a leg that rounds to zero.
pub fn plan(request: &SplitPlanRequest) -> PlanResult<Vec<SplitLeg>> {
    request.check()?;

    let prices = leg_prices(request)?;
    let quantities = leg_quantities(request)?;

    Ok(prices
        .into_iter()
        .zip(quantities)
        .map(|(price, quantity)| SplitLeg { price, quantity })
        .collect())
}

fn leg_prices(request: &SplitPlanRequest) -> PlanResult<Vec<Price>> {
    let n = request.split_count;
    let min = request.min_price.inner();
    let max = request.max_price.inner();
    let step = (max - min) / Decimal::from(n - 1);
    let raw = |i: usize| {
        if i == n - 1 {
            max
        } else {
            min + step * Decimal::from(i)
        }
    };

    let Some(asset) = &request.asset else {
        return Ok((0..n).map(|i| Price::new(raw(i).normalize())).collect());
    };

    // Bounds are rounded inward so every leg stays inside the range.
    let low = asset.round_price_with(request.min_price, RoundingStrategy::AwayFromZero);
    let high = asset.round_price_with(request.max_price, RoundingStrategy::ToZero);
    if low > high {
        return Err(PlanError::EmptyPriceGrid {
            min: request.min_price,
            max: request.max_price,
        });
    }

    Ok((0..n)
        .map(|i| match i {
            0 => low,
            i if i == n - 1 => high,
            i => asset
                .round_price_with(Price::new(raw(i)), RoundingStrategy::MidpointNearestEven)
                .clamp(low, high),
        })
        .collect())
}

fn leg_quantities(request: &SplitPlanRequest) -> PlanResult<Vec<Size>> {
    let n = request.split_count;
    let bias = request.scale_bias;
    let total = request.total_quantity.inner();
    let weight_sum: u64 = (0..n).map(|i| bias.weight(i, n)).sum();
    let scale = request
        .asset
        .as_ref()
        .map_or(UNROUNDED_QUANTITY_SCALE, |a| a.sz_decimals);

    let mut quantities: Vec<Decimal> = (0..n)
        .map(|i| {
            (total * Decimal::from(bias.weight(i, n)) / Decimal::from(weight_sum))
                .round_dp_with_strategy(scale, RoundingStrategy::ToZero)
        })
        .collect();

    let heaviest = bias.heaviest(n);
    let allocated: Decimal = quantities
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != heaviest)
        .map(|(_, q)| *q)
        .sum();
    quantities[heaviest] = total - allocated;

    quantities
        .into_iter()
        .enumerate()
        .map(|(index, q)| {
            if q.is_zero() {
                Err(PlanError::LegTooSmall { index })
            } else {
                Ok(Size::new(q.normalize()))
            }
        })
        .collect()
}

/// Turn planned legs into limit orders, one per leg.
pub fn to_orders(
    legs: &[SplitLeg],
    symbol: &str,
    side: OrderSide,
    tif: TimeInForce,
    reduce_only: bool,
) -> PlanResult<Vec<OrderRequest>> {
    legs.iter()
        .map(|leg| {
            let order = OrderRequest::limit(symbol, side, leg.quantity, leg.price, tif)?;
            Ok(if reduce_only {
                order.into_reduce_only()
            } else {
                order
            })
        })
        .collect()
}
