//! Split order planning and basket/stop-loss management for hlx.
//!
//! # Key Components
//!
//! - [`plan`]: Deterministic split of a parent quantity over a price range
//! - [`BasketConfig`] / [`Basket`]: Entry leg plus stop-loss / take-profit exits
//! - [`BasketManagerTask`] / [`BasketManagerHandle`]: Actor owning the basket
//!   registry, evaluating ticks and submitting exits through the shared
//!   [`hlx_executor::OrderPipeline`]
//! - [`global`]: Process-wide manager install / teardown

pub mod basket;
pub mod error;
pub mod global;
pub mod manager;
pub mod split;

pub use basket::{
    check_slippage_bps, Basket, BasketConfig, BasketEvent, BasketFailure, BasketId, BasketState,
    ClosedBasket, EntryKind, ExitKind, TriggerRecord, SLIPPAGE_BPS_LIMIT,
};
pub use error::{BasketError, BasketResult, PlanError, PlanResult};
pub use manager::{
    spawn_basket_manager, submit_leg, BasketManagerConfig, BasketManagerHandle, BasketManagerTask,
    BasketMsg, Leg, SubmissionOutcome, DEFAULT_SLIPPAGE_BPS,
};
pub use split::{plan, to_orders, ScaleBias, SplitLeg, SplitPlanRequest};
