//! Transaction dispatcher.

use crate::config::Config;
use crate::dispatcher::ledger::PermitLedger;
use crate::dispatcher::queue::WaiterQueue;
use crate::error::{EnvError, EnvResult};
use crate::stats::DispatcherStats;
use crate::transaction::Transaction;
use crate::types::ActorId;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Bounds how many transactions may be live against the environment.
///
/// The dispatcher hands out permits from a fixed pool. A regular
/// transaction costs one permit; an exclusive transaction costs
/// whatever raises its actor's holding to the full pool. Acquisition
/// is reentrant: an actor that already holds permits can take more,
/// up to the pool size, without waiting on itself.
///
/// ## Fairness
///
/// Waiters park in an arrival-ordered queue, and a newly arriving
/// regular acquirer that finds the queue non-empty must join it even
/// if permits are free, so regular traffic is served strictly FIFO.
/// An exclusive waiter stuck at the head of that queue would block
/// everyone behind it; instead it is shuffled to a second queue,
/// keeping its arrival position within the exclusive class, and
/// regular traffic resumes around it.
///
/// ## Blocking
///
/// All operations serialize on one internal mutex, and waiters sleep
/// on one condition variable that is broadcast on every event that
/// could let any waiter proceed. The critical section is a few map
/// operations, so the single lock is not a throughput concern.
pub struct TransactionDispatcher {
    /// Size of the permit pool, fixed at construction.
    total_permits: u32,
    /// Ledger, queues, and the order counter, under one lock.
    state: Mutex<DispatchState>,
    /// Broadcast on release, promotion, and ticket removal.
    wakeup: Condvar,
    /// Permit traffic counters.
    stats: DispatcherStats,
}

#[derive(Debug)]
struct DispatchState {
    ledger: PermitLedger,
    regular: WaiterQueue,
    exclusive: WaiterQueue,
    next_order: u64,
}

impl DispatchState {
    fn allocate_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }
}

impl TransactionDispatcher {
    /// Creates a dispatcher with the given permit pool size.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidCapacity`] if `max_concurrent_txns`
    /// is zero.
    pub fn new(max_concurrent_txns: u32) -> EnvResult<Self> {
        if max_concurrent_txns < 1 {
            return Err(EnvError::invalid_capacity(max_concurrent_txns));
        }
        Ok(Self {
            total_permits: max_concurrent_txns,
            state: Mutex::new(DispatchState {
                ledger: PermitLedger::new(),
                regular: WaiterQueue::new(),
                exclusive: WaiterQueue::new(),
                next_order: 0,
            }),
            wakeup: Condvar::new(),
            stats: DispatcherStats::new(),
        })
    }

    /// Returns the number of permits not currently handed out.
    #[must_use]
    pub fn available_permits(&self) -> u32 {
        let state = self.state.lock();
        self.total_permits - state.ledger.acquired()
    }

    /// Returns the number of actors parked in the regular queue.
    #[must_use]
    pub fn regular_waiter_count(&self) -> usize {
        self.state.lock().regular.len()
    }

    /// Returns the number of actors parked in the exclusive queue.
    #[must_use]
    pub fn exclusive_waiter_count(&self) -> usize {
        self.state.lock().exclusive.len()
    }

    /// Returns the dispatcher's traffic counters.
    #[must_use]
    pub fn stats(&self) -> &DispatcherStats {
        &self.stats
    }

    /// Acquires a single permit for `actor`, blocking until granted.
    ///
    /// Acquisition is reentrant with respect to permits the actor
    /// already holds. If the pool is full, or anyone is already
    /// queued, the actor joins the back of the regular queue and is
    /// served in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::CapacityExhausted`] if the actor already
    /// holds the entire pool.
    pub fn acquire(&self, actor: ActorId) -> EnvResult<()> {
        let mut state = self.state.lock();
        self.permits_to_acquire(&state, actor)?;
        if state.ledger.acquired() == self.total_permits || !state.regular.is_empty() {
            let order = state.allocate_order();
            state.regular.enqueue(order, actor);
            loop {
                self.wakeup.wait(&mut state);
                if state.ledger.acquired() < self.total_permits
                    && state.regular.front() == Some(order)
                {
                    break;
                }
            }
            state.regular.dequeue_front();
        }
        state.ledger.charge(actor, 1);
        self.stats.record_acquire();
        Ok(())
    }

    /// Acquires exclusive permits for `actor`, blocking until granted.
    ///
    /// Raises the actor's holding to the entire pool and returns the
    /// number of permits actually granted. While parked at the head
    /// of the regular queue without a grant, the waiter is shuffled
    /// to the exclusive queue so regular traffic behind it can
    /// proceed; its arrival order is preserved within the exclusive
    /// class.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::CapacityExhausted`] if the actor already
    /// holds the entire pool.
    pub fn acquire_exclusive(&self, actor: ActorId) -> EnvResult<u32> {
        let mut state = self.state.lock();
        let held = self.permits_to_acquire(&state, actor)?;
        let need = self.total_permits - held;
        if state.ledger.acquired() > self.total_permits - need || !state.regular.is_empty() {
            let order = state.allocate_order();
            state.regular.enqueue(order, actor);
            let mut in_exclusive = false;
            loop {
                self.wakeup.wait(&mut state);
                let head = if in_exclusive {
                    state.exclusive.front()
                } else {
                    state.regular.front()
                };
                if head != Some(order) {
                    continue;
                }
                if state.ledger.acquired() <= self.total_permits - need {
                    break;
                }
                if !in_exclusive {
                    // Head of the regular queue but still short of a
                    // grant: step aside so regular traffic can pass.
                    state.regular.dequeue_front();
                    state.exclusive.enqueue(order, actor);
                    in_exclusive = true;
                    self.stats.record_promotion();
                    trace!("{} promoted to the exclusive queue", actor);
                    self.wakeup.notify_all();
                }
            }
            self.dequeue_granted(&mut state, in_exclusive);
        }
        state.ledger.charge(actor, need);
        self.stats.record_exclusive_acquire();
        Ok(need)
    }

    /// Tries to acquire exclusive permits for `actor` within `timeout`.
    ///
    /// Returns the number of permits granted: the full requirement on
    /// success, `1` if the acquisition was downgraded to a regular
    /// one, or `0` if the budget expired with nothing granted. The
    /// budget covers the exclusive acquisition; once downgraded, the
    /// single-permit attempt gets at most one more eligibility check
    /// before an expired budget ends it.
    ///
    /// Downgrade also happens without budget pressure when another
    /// exclusive waiter is already parked, so exclusive requests do
    /// not pile up behind each other.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::CapacityExhausted`] if the actor already
    /// holds the entire pool.
    pub fn try_acquire_exclusive(&self, actor: ActorId, timeout: Duration) -> EnvResult<u32> {
        let started = Instant::now();
        let mut state = self.state.lock();
        let held = self.permits_to_acquire(&state, actor)?;
        let mut need = self.total_permits - held;
        if state.ledger.acquired() > self.total_permits - need || !state.regular.is_empty() {
            let order = state.allocate_order();
            state.regular.enqueue(order, actor);
            let mut in_exclusive = false;
            loop {
                let remaining = timeout.saturating_sub(started.elapsed());
                if !remaining.is_zero() {
                    self.wakeup.wait_for(&mut state, remaining);
                }
                let head = if in_exclusive {
                    state.exclusive.front()
                } else {
                    state.regular.front()
                };
                if head == Some(order) {
                    if state.ledger.acquired() <= self.total_permits - need {
                        break;
                    }
                    if need > 1 && !in_exclusive {
                        if state.exclusive.is_empty() {
                            state.regular.dequeue_front();
                            state.exclusive.enqueue(order, actor);
                            in_exclusive = true;
                            self.stats.record_promotion();
                            trace!("{} promoted to the exclusive queue", actor);
                            self.wakeup.notify_all();
                        } else {
                            // Another exclusive waiter is already
                            // parked; settle for a single permit.
                            need = 1;
                            self.stats.record_downgrade();
                            debug!("exclusive acquisition by {} downgraded to a single permit", actor);
                        }
                        continue;
                    }
                }
                if started.elapsed() >= timeout {
                    if need == 1 {
                        // Out of budget with nothing to show: leave
                        // the queue and wake whoever is behind us.
                        let queue = if in_exclusive {
                            &mut state.exclusive
                        } else {
                            &mut state.regular
                        };
                        queue.remove(order);
                        self.wakeup.notify_all();
                        self.stats.record_timeout();
                        debug!("{} gave up waiting for exclusive permits after {:?}", actor, timeout);
                        return Ok(0);
                    }
                    need = 1;
                    self.stats.record_downgrade();
                    debug!("exclusive acquisition by {} downgraded to a single permit", actor);
                }
            }
            self.dequeue_granted(&mut state, in_exclusive);
        }
        state.ledger.charge(actor, need);
        if need > 1 {
            self.stats.record_exclusive_acquire();
        } else {
            self.stats.record_acquire();
        }
        Ok(need)
    }

    /// Admits a transaction, choosing the acquisition mode from its
    /// flags and recording the granted permits on it.
    ///
    /// A transaction created exclusive (other than GC) waits for the
    /// full pool unconditionally. GC and replayed-exclusive
    /// transactions get a bounded wait from `config`; if that yields
    /// a single permit the transaction's exclusive flag is cleared,
    /// and if it yields nothing the transaction is admitted as a
    /// regular one.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::CapacityExhausted`] if the creating actor
    /// already holds the entire pool.
    pub fn acquire_for(&self, txn: &mut Transaction, config: &Config) -> EnvResult<()> {
        let actor = txn.actor();
        if txn.is_exclusive() {
            if txn.was_created_exclusive() && !txn.is_gc() {
                let granted = self.acquire_exclusive(actor)?;
                txn.set_acquired_permits(granted);
                return Ok(());
            }
            let timeout = if txn.is_gc() {
                config.gc_acquire_timeout
            } else {
                config.replay_acquire_timeout
            };
            let granted = self.try_acquire_exclusive(actor, timeout)?;
            if granted > 0 {
                if granted == 1 {
                    txn.set_exclusive(false);
                }
                txn.set_acquired_permits(granted);
                return Ok(());
            }
        }
        self.acquire(actor)?;
        txn.set_acquired_permits(1);
        Ok(())
    }

    /// Returns `permits` permits held by `actor` to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::OverRelease`] if `actor` holds fewer than
    /// `permits`; nothing is released in that case.
    pub fn release(&self, actor: ActorId, permits: u32) -> EnvResult<()> {
        let mut state = self.state.lock();
        let held = state.ledger.held_by(actor);
        if permits > held {
            return Err(EnvError::over_release(actor, held, permits));
        }
        state.ledger.credit(actor, permits);
        self.stats.record_release();
        self.wakeup.notify_all();
        Ok(())
    }

    /// Returns the permits recorded on a transaction to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::OverRelease`] if the transaction records
    /// more permits than its actor holds.
    pub fn release_for(&self, txn: &Transaction) -> EnvResult<()> {
        self.release(txn.actor(), txn.acquired_permits())
    }

    /// Validates that `actor` can take at least one more permit and
    /// returns how many it currently holds.
    fn permits_to_acquire(&self, state: &DispatchState, actor: ActorId) -> EnvResult<u32> {
        let held = state.ledger.held_by(actor);
        if held == self.total_permits {
            return Err(EnvError::capacity_exhausted(actor, held));
        }
        Ok(held)
    }

    /// Removes a granted waiter from the front of whichever queue it
    /// ended up in.
    fn dequeue_granted(&self, state: &mut DispatchState, in_exclusive: bool) {
        let dequeued = if in_exclusive {
            state.exclusive.dequeue_front()
        } else {
            state.regular.dequeue_front()
        };
        debug_assert!(dequeued.is_some());
    }
}

impl std::fmt::Debug for TransactionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TransactionDispatcher")
            .field("total_permits", &self.total_permits)
            .field("acquired", &state.ledger.acquired())
            .field("regular_waiters", &state.regular.len())
            .field("exclusive_waiters", &state.exclusive.len())
            .finish_non_exhaustive()
    }
}
