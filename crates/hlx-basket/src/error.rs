//! Basket and split planning error types.

use hlx_core::{CoreError, Price, Size};
use hlx_executor::ExecutorError;
use thiserror::Error;

use crate::basket::{BasketId, BasketState};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("Split count must be in 2..=10, got {0}")]
    InvalidSplitCount(usize),

    #[error("Invalid price range: min {min} > max {max}")]
    InvalidPriceRange { min: Price, max: Price },

    #[error("No valid price between {min} and {max} at the asset's precision")]
    EmptyPriceGrid { min: Price, max: Price },

    #[error("Price must be positive, got {0}")]
    NonPositivePrice(Price),

    #[error("Total quantity must be positive, got {0}")]
    NonPositiveQuantity(Size),

    #[error("Total quantity {quantity} has more than {sz_decimals} decimals")]
    QuantityPrecision { quantity: Size, sz_decimals: u32 },

    #[error("Leg {index} rounds to zero size")]
    LegTooSmall { index: usize },

    #[error("Invalid leg order: {0}")]
    Order(#[from] CoreError),
}

pub type PlanResult<T> = Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum BasketError {
    #[error("Invalid basket config: {0}")]
    InvalidConfig(String),

    #[error("Basket not found: {0}")]
    NotFound(BasketId),

    #[error("Basket {id} is {state}, cannot {operation}")]
    InvalidState {
        id: BasketId,
        state: BasketState,
        operation: &'static str,
    },

    #[error("Basket {0} was cancelled")]
    Cancelled(BasketId),

    #[error("Order submission failed: {0}")]
    Execution(#[from] ExecutorError),

    /// The exchange accepted the action but refused the order.
    #[error("Order refused by exchange: {0}")]
    OrderRefused(String),

    #[error("Invalid order: {0}")]
    Order(#[from] CoreError),

    #[error("Basket manager is not running")]
    ManagerUnavailable,

    #[error("A basket manager is already installed")]
    AlreadyInstalled,
}

pub type BasketResult<T> = Result<T, BasketError>;
