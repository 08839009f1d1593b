//! Prometheus metrics for hlx.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a programming error that should crash at
//! first use rather than silently drop samples.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Baskets registered.
/// Labels: symbol
pub static BASKETS_CREATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlx_baskets_created_total",
        "Total baskets registered",
        &["symbol"]
    )
    .unwrap()
});

/// Baskets currently in the registry (not yet completed or cancelled).
pub static LIVE_BASKETS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("hlx_live_baskets", "Baskets currently tracked").unwrap()
});

/// Exit triggers fired.
/// Labels: symbol, kind (stop_loss/take_profit)
pub static BASKET_TRIGGERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlx_basket_triggers_total",
        "Total basket exit triggers",
        &["symbol", "kind"]
    )
    .unwrap()
});

/// Order submissions by outcome.
/// Labels: source (entry/exit/cli), outcome (accepted/rejected/retryable/fatal/aborted)
pub static SUBMISSIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlx_submissions_total",
        "Total signed action submissions",
        &["source", "outcome"]
    )
    .unwrap()
});

/// Sign-and-send latency in milliseconds.
pub static SUBMISSION_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "hlx_submission_latency_ms",
        "Latency from signing to exchange response in milliseconds",
        &["source"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Signatures whose recovered address did not match the signer.
pub static SIGNATURE_INTEGRITY_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hlx_signature_integrity_failures_total",
        "Signatures that failed the recovery self-check"
    )
    .unwrap()
});

/// Signed payloads rejected by the wire validator.
pub static VALIDATION_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hlx_validation_failures_total",
        "Signed payloads rejected by the wire validator"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn basket_created(symbol: &str) {
        BASKETS_CREATED_TOTAL.with_label_values(&[symbol]).inc();
    }

    pub fn live_baskets_set(count: usize) {
        LIVE_BASKETS.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn basket_triggered(symbol: &str, kind: &str) {
        BASKET_TRIGGERS_TOTAL
            .with_label_values(&[symbol, kind])
            .inc();
    }

    pub fn submission(source: &str, outcome: &str) {
        SUBMISSIONS_TOTAL.with_label_values(&[source, outcome]).inc();
    }

    pub fn submission_latency(source: &str, latency_ms: f64) {
        SUBMISSION_LATENCY_MS
            .with_label_values(&[source])
            .observe(latency_ms);
    }

    pub fn signature_integrity_failure() {
        SIGNATURE_INTEGRITY_FAILURES.inc();
    }

    pub fn validation_failure() {
        VALIDATION_FAILURES.inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
