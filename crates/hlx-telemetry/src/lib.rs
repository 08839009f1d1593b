//! Prometheus metrics and structured logging for hlx.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus counters for baskets, triggers and order submissions

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
