//! Error types for hlx-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Unknown asset symbol: {0}")]
    UnknownAsset(String),

    #[error("Invalid client order id: {0}")]
    InvalidCloid(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
