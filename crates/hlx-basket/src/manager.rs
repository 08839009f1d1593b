//! Basket manager actor.
//!
//! [`BasketManagerTask`] owns every live basket and processes messages one
//! at a time, so trigger evaluation for a basket never runs concurrently
//! with itself and ticks are evaluated in arrival order. Order submission
//! runs in spawned tasks; their outcomes come back as messages, so a slow
//! exchange round trip never stalls tick ingestion.
//!
//! # Architecture
//!
//! ```text
//! BasketManagerHandle --mpsc--> BasketManagerTask --spawn--> submit_leg()
//!         ^                           |   ^                       |
//!         +------oneshot replies------+   +------SubmissionDone---+
//!                                     |
//!                                broadcast<BasketEvent>
//! ```

use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use hlx_core::{Grouping, OrderRequest, Price};
use hlx_executor::{ExecutorError, OrderPipeline, SubmitReport};
use hlx_telemetry::Metrics;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::basket::{
    Basket, BasketConfig, BasketEvent, BasketFailure, BasketId, BasketState, ClosedBasket,
    ExitKind, TriggerRecord,
};
use crate::error::{BasketError, BasketResult};

pub const DEFAULT_SLIPPAGE_BPS: u32 = 50;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
pub const DEFAULT_CLOSED_HISTORY: usize = 256;
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketManagerConfig {
    /// Slippage allowance for market legs when a basket sets none.
    pub slippage_bps: u32,
    pub channel_capacity: usize,
    /// Completed and cancelled baskets kept for `recent_closed`.
    pub closed_history: usize,
    pub event_capacity: usize,
}

impl Default for BasketManagerConfig {
    fn default() -> Self {
        Self {
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            closed_history: DEFAULT_CLOSED_HISTORY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

// ============================================================================
// Submission
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Entry,
    Exit,
}

impl Leg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }
}

#[derive(Debug)]
pub enum SubmissionOutcome {
    Accepted(SubmitReport),
    /// The basket was cancelled after signing; nothing was sent.
    Aborted,
    Failed(ExecutorError),
}

/// Sign `order` and send it unless `cancel` is set by then.
///
/// The flag is read after signing, immediately before the send, which is
/// the last point a cancellation can still stop the order.
pub async fn submit_leg(
    pipeline: &OrderPipeline,
    order: OrderRequest,
    cancel: &AtomicBool,
) -> SubmissionOutcome {
    let signed = match pipeline
        .build_action(std::slice::from_ref(&order), Grouping::Na)
        .and_then(|action| pipeline.sign_action(action))
    {
        Ok(signed) => signed,
        Err(e) => return SubmissionOutcome::Failed(e),
    };

    if cancel.load(Ordering::SeqCst) {
        debug!(nonce = signed.nonce, "cancelled before send, dropping signed action");
        return SubmissionOutcome::Aborted;
    }

    match pipeline.submit_signed(signed).await {
        Ok(report) => SubmissionOutcome::Accepted(report),
        Err(e) => SubmissionOutcome::Failed(e),
    }
}

/// Submission outcome reduced to what the state machine needs.
enum Settled {
    Accepted { nonce: u64 },
    Aborted,
    Failed(BasketFailure, BasketError),
}

impl SubmissionOutcome {
    fn metric_label(&self) -> &'static str {
        match self {
            Self::Accepted(report) if report.first_error().is_some() => "rejected",
            Self::Accepted(_) => "accepted",
            Self::Aborted => "aborted",
            Self::Failed(e) if e.is_fatal() => "fatal",
            Self::Failed(e) if e.is_retryable() => "retryable",
            Self::Failed(_) => "rejected",
        }
    }

    fn settle(self) -> Settled {
        match self {
            Self::Accepted(report) => match report.first_error() {
                None => Settled::Accepted {
                    nonce: report.nonce,
                },
                // Exchange took the action but refused the order; the
                // basket stays armed for the next tick.
                Some(message) => Settled::Failed(
                    BasketFailure {
                        message: message.to_string(),
                        retryable: true,
                    },
                    BasketError::OrderRefused(message.to_string()),
                ),
            },
            Self::Aborted => Settled::Aborted,
            Self::Failed(err) => {
                match &err {
                    ExecutorError::SignatureIntegrity { .. } => {
                        Metrics::signature_integrity_failure()
                    }
                    ExecutorError::Validation(_) => Metrics::validation_failure(),
                    _ => {}
                }
                Settled::Failed(
                    BasketFailure {
                        message: err.to_string(),
                        retryable: !err.is_fatal(),
                    },
                    BasketError::Execution(err),
                )
            }
        }
    }
}

fn spawn_submission(
    pipeline: Arc<OrderPipeline>,
    done_tx: mpsc::Sender<SubmissionDone>,
    id: BasketId,
    leg: Leg,
    order: OrderRequest,
    cancel: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        let started = Instant::now();
        let outcome = submit_leg(&pipeline, order, &cancel).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let done = SubmissionDone {
            id,
            leg,
            outcome,
            latency_ms,
        };
        if let Err(e) = done_tx.send(done).await {
            warn!(basket = %e.0.id, leg = e.0.leg.as_str(), "manager stopped before submission outcome");
        }
    });
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub enum BasketMsg {
    Create {
        config: BasketConfig,
        reply: oneshot::Sender<BasketResult<BasketId>>,
    },
    Cancel {
        id: BasketId,
        reply: oneshot::Sender<bool>,
    },
    GetAll {
        reply: oneshot::Sender<Vec<Basket>>,
    },
    Get {
        id: BasketId,
        reply: oneshot::Sender<Option<Basket>>,
    },
    /// Submit the entry leg; replies once the exchange answered.
    Activate {
        id: BasketId,
        reply: oneshot::Sender<BasketResult<Basket>>,
    },
    EntryFilled {
        id: BasketId,
        reply: oneshot::Sender<BasketResult<()>>,
    },
    /// Price observation. `reply` is set for injected test ticks and
    /// receives the ids of the baskets the tick fired.
    Tick {
        symbol: String,
        price: Price,
        reply: Option<oneshot::Sender<Vec<BasketId>>>,
    },
    RecentClosed {
        reply: oneshot::Sender<Vec<ClosedBasket>>,
    },
    Shutdown,
}

#[derive(Debug)]
struct SubmissionDone {
    id: BasketId,
    leg: Leg,
    outcome: SubmissionOutcome,
    latency_ms: f64,
}

// ============================================================================
// BasketManagerTask
// ============================================================================

struct BasketEntry {
    basket: Basket,
    /// Set on cancel; read by in-flight submissions right before sending.
    cancel: Arc<AtomicBool>,
    in_flight: bool,
    activation: Option<oneshot::Sender<BasketResult<Basket>>>,
}

pub struct BasketManagerTask {
    rx: mpsc::Receiver<BasketMsg>,
    done_tx: mpsc::Sender<SubmissionDone>,
    done_rx: mpsc::Receiver<SubmissionDone>,
    pipeline: Arc<OrderPipeline>,
    config: BasketManagerConfig,
    baskets: HashMap<BasketId, BasketEntry>,
    closed: VecDeque<ClosedBasket>,
    events: broadcast::Sender<BasketEvent>,
}

impl BasketManagerTask {
    /// Run the basket manager actor.
    ///
    /// Processes messages until Shutdown is received or every handle is
    /// dropped.
    pub async fn run(mut self) {
        debug!("BasketManagerTask started");

        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(BasketMsg::Shutdown) | None => {
                        debug!("BasketManagerTask shutting down");
                        break;
                    }
                    Some(msg) => self.handle_message(msg),
                },
                Some(done) = self.done_rx.recv() => self.on_submission_done(done),
            }
        }

        if !self.baskets.is_empty() {
            info!(live = self.baskets.len(), "basket manager stopped with live baskets");
        }
        debug!("BasketManagerTask terminated");
    }

    fn handle_message(&mut self, msg: BasketMsg) {
        match msg {
            BasketMsg::Create { config, reply } => {
                let _ = reply.send(self.on_create(config));
            }
            BasketMsg::Cancel { id, reply } => {
                let _ = reply.send(self.on_cancel(&id));
            }
            BasketMsg::GetAll { reply } => {
                let mut all: Vec<Basket> =
                    self.baskets.values().map(|e| e.basket.clone()).collect();
                all.sort_by(oldest_first);
                let _ = reply.send(all);
            }
            BasketMsg::Get { id, reply } => {
                let _ = reply.send(self.baskets.get(&id).map(|e| e.basket.clone()));
            }
            BasketMsg::Activate { id, reply } => self.on_activate(id, reply),
            BasketMsg::EntryFilled { id, reply } => {
                let _ = reply.send(self.on_entry_filled(&id));
            }
            BasketMsg::Tick {
                symbol,
                price,
                reply,
            } => {
                let fired = self.on_tick(&symbol, price, reply.is_some());
                if let Some(reply) = reply {
                    let _ = reply.send(fired);
                }
            }
            BasketMsg::RecentClosed { reply } => {
                let _ = reply.send(self.closed.iter().cloned().collect());
            }
            BasketMsg::Shutdown => unreachable!("Shutdown handled in run()"),
        }
    }

    fn emit(&self, event: BasketEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn on_create(&mut self, config: BasketConfig) -> BasketResult<BasketId> {
        let asset = self
            .pipeline
            .assets()
            .resolve(&config.symbol)
            .map_err(|e| BasketError::InvalidConfig(e.to_string()))?;
        config.validate(asset)?;

        let id = BasketId::new();
        let symbol = config.symbol.clone();
        info!(
            basket = %id,
            %symbol,
            side = %config.side,
            size = %config.size,
            entry = %config.entry_price,
            stop_loss = ?config.stop_loss.map(|p| p.to_string()),
            take_profit = ?config.take_profit.map(|p| p.to_string()),
            "basket created"
        );

        self.baskets.insert(
            id.clone(),
            BasketEntry {
                basket: Basket::new(id.clone(), config),
                cancel: Arc::new(AtomicBool::new(false)),
                in_flight: false,
                activation: None,
            },
        );
        Metrics::basket_created(&symbol);
        Metrics::live_baskets_set(self.baskets.len());
        self.emit(BasketEvent::Created {
            id: id.clone(),
            symbol,
        });
        Ok(id)
    }

    fn on_cancel(&mut self, id: &BasketId) -> bool {
        // Terminal baskets have already left the registry.
        let Some(mut entry) = self.baskets.remove(id) else {
            debug!(basket = %id, "cancel ignored: unknown or closed basket");
            return false;
        };

        entry.cancel.store(true, Ordering::SeqCst);
        let previous = entry.basket.state;
        entry.basket.set_state(BasketState::Cancelled);
        if let Some(reply) = entry.activation.take() {
            let _ = reply.send(Err(BasketError::Cancelled(id.clone())));
        }

        info!(basket = %id, %previous, in_flight = entry.in_flight, "basket cancelled");
        self.emit(BasketEvent::Cancelled { id: id.clone() });
        self.archive(entry.basket);
        true
    }

    fn on_activate(&mut self, id: BasketId, reply: oneshot::Sender<BasketResult<Basket>>) {
        let Some(entry) = self.baskets.get_mut(&id) else {
            let _ = reply.send(Err(BasketError::NotFound(id)));
            return;
        };
        if entry.basket.state != BasketState::Pending || entry.in_flight {
            let _ = reply.send(Err(BasketError::InvalidState {
                id,
                state: entry.basket.state,
                operation: "activate",
            }));
            return;
        }

        let config = &entry.basket.config;
        let slippage = config.slippage_bps.unwrap_or(self.config.slippage_bps);
        let order = match self
            .pipeline
            .assets()
            .resolve(&config.symbol)
            .map_err(BasketError::from)
            .and_then(|asset| config.entry_order(asset, slippage))
        {
            Ok(order) => order,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        debug!(basket = %id, price = %order.limit_price(), "submitting entry leg");
        entry.in_flight = true;
        entry.activation = Some(reply);
        spawn_submission(
            Arc::clone(&self.pipeline),
            self.done_tx.clone(),
            id,
            Leg::Entry,
            order,
            Arc::clone(&entry.cancel),
        );
    }

    fn on_entry_filled(&mut self, id: &BasketId) -> BasketResult<()> {
        let entry = self
            .baskets
            .get_mut(id)
            .ok_or_else(|| BasketError::NotFound(id.clone()))?;
        match entry.basket.state {
            BasketState::Pending => {
                entry.basket.set_state(BasketState::Active);
                info!(basket = %id, "entry filled, basket active");
                self.emit(BasketEvent::Activated { id: id.clone() });
                Ok(())
            }
            BasketState::Active => Ok(()),
            state => Err(BasketError::InvalidState {
                id: id.clone(),
                state,
                operation: "confirm entry",
            }),
        }
    }

    fn on_tick(&mut self, symbol: &str, price: Price, injected: bool) -> Vec<BasketId> {
        trace!(%symbol, %price, injected, "tick");

        // State is checked on every tick; a Triggered basket is never armed.
        let mut candidates: Vec<(&Basket, ExitKind)> = self
            .baskets
            .values()
            .filter(|e| e.basket.symbol() == symbol && e.basket.is_armed() && !e.in_flight)
            .filter_map(|e| {
                e.basket
                    .config
                    .check_trigger(price)
                    .map(|kind| (&e.basket, kind))
            })
            .collect();
        candidates.sort_by(|a, b| oldest_first(a.0, b.0));
        let candidates: Vec<(BasketId, ExitKind)> = candidates
            .into_iter()
            .map(|(basket, kind)| (basket.id.clone(), kind))
            .collect();

        candidates
            .into_iter()
            .filter_map(|(id, kind)| self.fire_exit(id, kind, price, injected))
            .collect()
    }

    fn fire_exit(
        &mut self,
        id: BasketId,
        kind: ExitKind,
        price: Price,
        injected: bool,
    ) -> Option<BasketId> {
        let entry = self.baskets.get_mut(&id)?;
        let config = &entry.basket.config;
        let slippage = config.slippage_bps.unwrap_or(self.config.slippage_bps);
        let order = self
            .pipeline
            .assets()
            .resolve(&config.symbol)
            .map_err(BasketError::from)
            .and_then(|asset| config.exit_order(asset, price, slippage));

        let order = match order {
            Ok(order) => order,
            Err(e) => {
                warn!(basket = %id, error = %e, "cannot build exit order, disarming basket");
                let message = e.to_string();
                entry.basket.last_error = Some(BasketFailure {
                    message: message.clone(),
                    retryable: false,
                });
                self.emit(BasketEvent::SubmissionFailed {
                    id,
                    message,
                    retryable: false,
                });
                return None;
            }
        };

        entry.basket.trigger = Some(TriggerRecord {
            kind,
            price,
            at: Utc::now(),
        });
        entry.basket.set_state(BasketState::Triggered);
        entry.in_flight = true;

        info!(
            basket = %id,
            symbol = %entry.basket.config.symbol,
            %kind,
            %price,
            worst_price = %order.limit_price(),
            injected,
            "exit triggered"
        );
        Metrics::basket_triggered(&entry.basket.config.symbol, kind.as_str());

        spawn_submission(
            Arc::clone(&self.pipeline),
            self.done_tx.clone(),
            id.clone(),
            Leg::Exit,
            order,
            Arc::clone(&entry.cancel),
        );
        self.emit(BasketEvent::Triggered {
            id: id.clone(),
            kind,
            price,
        });
        Some(id)
    }

    fn on_submission_done(&mut self, done: SubmissionDone) {
        let SubmissionDone {
            id,
            leg,
            outcome,
            latency_ms,
        } = done;
        Metrics::submission(leg.as_str(), outcome.metric_label());
        Metrics::submission_latency(leg.as_str(), latency_ms);

        let settled = outcome.settle();
        if self.baskets.contains_key(&id) {
            match leg {
                Leg::Entry => self.on_entry_settled(&id, settled),
                Leg::Exit => self.on_exit_settled(&id, settled),
            }
        } else {
            self.record_late_outcome(&id, leg, &settled);
        }
    }

    fn on_entry_settled(&mut self, id: &BasketId, settled: Settled) {
        let Some(entry) = self.baskets.get_mut(id) else {
            return;
        };
        entry.in_flight = false;
        let reply = entry.activation.take();

        let (result, event) = match settled {
            Settled::Accepted { nonce } => {
                if entry.basket.state == BasketState::Pending {
                    entry.basket.set_state(BasketState::Active);
                }
                entry.basket.last_error = None;
                info!(basket = %id, nonce, "entry accepted, basket active");
                (
                    Ok(entry.basket.clone()),
                    Some(BasketEvent::Activated { id: id.clone() }),
                )
            }
            Settled::Aborted => (Err(BasketError::Cancelled(id.clone())), None),
            Settled::Failed(failure, err) => {
                warn!(basket = %id, error = %failure.message, retryable = failure.retryable, "entry submission failed");
                let event = BasketEvent::SubmissionFailed {
                    id: id.clone(),
                    message: failure.message.clone(),
                    retryable: failure.retryable,
                };
                entry.basket.last_error = Some(failure);
                (Err(err), Some(event))
            }
        };

        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn on_exit_settled(&mut self, id: &BasketId, settled: Settled) {
        let Some(entry) = self.baskets.get_mut(id) else {
            return;
        };
        entry.in_flight = false;

        match settled {
            Settled::Accepted { nonce } => {
                entry.basket.exit_nonce = Some(nonce);
                entry.basket.last_error = None;
                entry.basket.set_state(BasketState::Completed);
                info!(basket = %id, nonce, "exit accepted, basket completed");
                if let Some(entry) = self.baskets.remove(id) {
                    self.emit(BasketEvent::Completed {
                        id: id.clone(),
                        nonce,
                    });
                    self.archive(entry.basket);
                }
            }
            Settled::Aborted => {
                // Only cancel sets the flag, and cancel removes the basket.
                entry.basket.set_state(BasketState::Active);
            }
            Settled::Failed(failure, _) => {
                warn!(
                    basket = %id,
                    error = %failure.message,
                    retryable = failure.retryable,
                    "exit submission failed, basket back to active"
                );
                entry.basket.set_state(BasketState::Active);
                let event = BasketEvent::SubmissionFailed {
                    id: id.clone(),
                    message: failure.message.clone(),
                    retryable: failure.retryable,
                };
                entry.basket.last_error = Some(failure);
                self.emit(event);
            }
        }
    }

    /// Outcome of a submission whose basket was cancelled meanwhile.
    fn record_late_outcome(&mut self, id: &BasketId, leg: Leg, settled: &Settled) {
        let note = match settled {
            Settled::Accepted { nonce } => {
                warn!(basket = %id, leg = leg.as_str(), nonce, "order accepted after basket was cancelled");
                format!("{} accepted after cancellation (nonce {nonce})", leg.as_str())
            }
            Settled::Aborted => {
                debug!(basket = %id, leg = leg.as_str(), "submission aborted by cancellation");
                format!("{} aborted by cancellation", leg.as_str())
            }
            Settled::Failed(failure, _) => {
                debug!(basket = %id, leg = leg.as_str(), error = %failure.message, "submission failed after cancellation");
                format!("{} failed after cancellation: {}", leg.as_str(), failure.message)
            }
        };

        match self.closed.iter_mut().rev().find(|c| &c.basket.id == id) {
            Some(closed) => closed.late_outcome = Some(note),
            None => debug!(basket = %id, "closed record already evicted"),
        }
    }

    fn archive(&mut self, basket: Basket) {
        if self.config.closed_history > 0 {
            while self.closed.len() >= self.config.closed_history {
                self.closed.pop_front();
            }
            self.closed.push_back(ClosedBasket {
                basket,
                closed_at: Utc::now(),
                late_outcome: None,
            });
        }
        Metrics::live_baskets_set(self.baskets.len());
    }
}

/// Creation order; ids break ties between baskets created in the same instant.
fn oldest_first(a: &Basket, b: &Basket) -> CmpOrdering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

// ============================================================================
// BasketManagerHandle
// ============================================================================

/// Handle for interacting with the basket manager actor.
#[derive(Clone)]
pub struct BasketManagerHandle {
    tx: mpsc::Sender<BasketMsg>,
    events: broadcast::Sender<BasketEvent>,
}

impl std::fmt::Debug for BasketManagerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasketManagerHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl BasketManagerHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> BasketMsg,
    ) -> BasketResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| BasketError::ManagerUnavailable)?;
        rx.await.map_err(|_| BasketError::ManagerUnavailable)
    }

    /// Validate and register a basket in `Pending`.
    pub async fn create_basket(&self, config: BasketConfig) -> BasketResult<BasketId> {
        self.request(|reply| BasketMsg::Create { config, reply })
            .await?
    }

    /// Cancel a non-terminal basket. False if it does not exist or is
    /// already completed or cancelled.
    pub async fn cancel_basket(&self, id: &BasketId) -> bool {
        self.request(|reply| BasketMsg::Cancel {
            id: id.clone(),
            reply,
        })
        .await
        .unwrap_or(false)
    }

    /// Snapshot of all live baskets, oldest first.
    pub async fn get_all_baskets(&self) -> Vec<Basket> {
        self.request(|reply| BasketMsg::GetAll { reply })
            .await
            .unwrap_or_default()
    }

    pub async fn get_basket(&self, id: &BasketId) -> Option<Basket> {
        self.request(|reply| BasketMsg::Get {
            id: id.clone(),
            reply,
        })
        .await
        .ok()
        .flatten()
    }

    /// Submit the entry leg and wait for the exchange's answer.
    /// On acceptance the basket becomes `Active`.
    pub async fn activate_basket(&self, id: &BasketId) -> BasketResult<Basket> {
        self.request(|reply| BasketMsg::Activate {
            id: id.clone(),
            reply,
        })
        .await?
    }

    /// Entry filled outside this manager (e.g. a resting limit).
    pub async fn on_entry_filled(&self, id: &BasketId) -> BasketResult<()> {
        self.request(|reply| BasketMsg::EntryFilled {
            id: id.clone(),
            reply,
        })
        .await?
    }

    /// Queue a price observation without waiting for its evaluation.
    ///
    /// # Errors
    /// `BasketError::ManagerUnavailable` once the manager has stopped.
    pub async fn on_price_tick(&self, symbol: &str, price: Price) -> BasketResult<()> {
        self.tx
            .send(BasketMsg::Tick {
                symbol: symbol.to_string(),
                price,
                reply: None,
            })
            .await
            .map_err(|_| {
                warn!(%symbol, %price, "basket manager stopped, tick dropped");
                BasketError::ManagerUnavailable
            })
    }

    /// Inject a synthetic tick and return the baskets it fired.
    pub async fn simulate_stop_loss_trigger(&self, symbol: &str, price: Price) -> Vec<BasketId> {
        self.request(|reply| BasketMsg::Tick {
            symbol: symbol.to_string(),
            price,
            reply: Some(reply),
        })
        .await
        .unwrap_or_default()
    }

    /// Recently completed or cancelled baskets, oldest first.
    pub async fn recent_closed(&self) -> Vec<ClosedBasket> {
        self.request(|reply| BasketMsg::RecentClosed { reply })
            .await
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BasketEvent> {
        self.events.subscribe()
    }

    /// Request graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(BasketMsg::Shutdown).await;
    }
}

// ============================================================================
// Spawn function
// ============================================================================

/// Spawn the basket manager actor.
///
/// Returns a handle for interaction and a join handle for the task.
#[must_use]
pub fn spawn_basket_manager(
    pipeline: Arc<OrderPipeline>,
    config: BasketManagerConfig,
) -> (BasketManagerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let (done_tx, done_rx) = mpsc::channel(config.channel_capacity.max(1));
    let (events, _) = broadcast::channel(config.event_capacity.max(1));

    let task = BasketManagerTask {
        rx,
        done_tx,
        done_rx,
        pipeline,
        config,
        baskets: HashMap::new(),
        closed: VecDeque::new(),
        events: events.clone(),
    };

    let handle = BasketManagerHandle { tx, events };
    let join_handle = tokio::spawn(task.run());

    (handle, join_handle)
}

// ============================================================================
// Tests
// ============================================================================
