//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key error: {0}")]
    Key(#[from] hlx_executor::KeyError),

    #[error("Order error: {0}")]
    Order(#[from] hlx_core::CoreError),

    #[error("Executor error: {0}")]
    Executor(#[from] hlx_executor::ExecutorError),

    #[error("Basket error: {0}")]
    Basket(#[from] hlx_basket::BasketError),

    #[error("Plan error: {0}")]
    Plan(#[from] hlx_basket::PlanError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] hlx_telemetry::TelemetryError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
