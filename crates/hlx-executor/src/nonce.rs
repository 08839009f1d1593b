//! Nonce manager with monotonic guarantees.
//!
//! The exchange rejects a nonce it has already seen for a signer, and
//! expects nonces close to wall-clock milliseconds. [`NonceManager`] hands
//! out `max(last + 1, now_ms)` lock-free; [`NonceRegistry`] makes sure every
//! component signing for the same address shares one manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use dashmap::DashMap;

/// Trait for obtaining current time, enabling testability.
pub trait Clock: Send + Sync {
    /// Returns current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Strictly increasing nonce source.
///
/// Thread-safe; concurrent callers never receive the same value.
pub struct NonceManager<C: Clock = SystemClock> {
    /// Last issued nonce.
    counter: AtomicU64,
    clock: C,
}

impl<C: Clock> NonceManager<C> {
    /// The counter starts at the current time, so the first nonce is
    /// `now + 1` at the earliest.
    #[must_use]
    pub fn new(clock: C) -> Self {
        let now = clock.now_ms();
        Self {
            counter: AtomicU64::new(now),
            clock,
        }
    }

    /// Returns `max(last_nonce + 1, now_ms)`.
    ///
    /// Thread-safe via CAS loop.
    pub fn next(&self) -> u64 {
        let target = self.clock.now_ms();

        loop {
            let current = self.counter.load(Ordering::Acquire);
            let next_val = current.saturating_add(1).max(target);

            match self.counter.compare_exchange_weak(
                current,
                next_val,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next_val,
                Err(_) => continue,
            }
        }
    }

    /// Make sure the next nonce is greater than `seen`, e.g. a nonce used by
    /// another client with the same key.
    pub fn fast_forward(&self, seen: u64) {
        self.counter.fetch_max(seen, Ordering::AcqRel);
    }

    /// Last nonce handed out (or the seed if none yet).
    #[must_use]
    pub fn last(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }
}

impl NonceManager<SystemClock> {
    #[must_use]
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock)
    }
}

/// One shared [`NonceManager`] per signer address.
pub struct NonceRegistry<C: Clock + Clone = SystemClock> {
    managers: DashMap<Address, Arc<NonceManager<C>>>,
    clock: C,
}

impl<C: Clock + Clone> NonceRegistry<C> {
    pub fn new(clock: C) -> Self {
        Self {
            managers: DashMap::new(),
            clock,
        }
    }

    /// Manager for `signer`, created on first use.
    pub fn for_signer(&self, signer: Address) -> Arc<NonceManager<C>> {
        self.managers
            .entry(signer)
            .or_insert_with(|| Arc::new(NonceManager::new(self.clock.clone())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

impl Default for NonceRegistry<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}
