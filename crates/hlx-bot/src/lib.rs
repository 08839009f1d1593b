//! hlx application layer.
//!
//! Wires the signing pipeline and the basket manager together from a TOML
//! configuration:
//! - Key loading and signer construction
//! - Exchange transport (HTTP)
//! - Basket manager lifecycle and price tick ingestion

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, PriceTick, RunSummary};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
