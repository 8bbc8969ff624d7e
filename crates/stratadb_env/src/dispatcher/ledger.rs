//! Permit bookkeeping.

use crate::types::ActorId;
use std::collections::HashMap;

/// Tracks how many permits are out, in total and per actor.
///
/// The ledger is plain data guarded by the dispatcher's lock; it does
/// no synchronization of its own. Two invariants hold between lock
/// holds: the total equals the sum of the per-actor counts, and no
/// actor entry stores zero.
#[derive(Debug, Default)]
pub(crate) struct PermitLedger {
    /// Permits currently handed out across all actors.
    acquired: u32,
    /// Permits held per actor; entries are removed when they hit zero.
    per_actor: HashMap<ActorId, u32>,
}

impl PermitLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of permits handed out.
    pub(crate) fn acquired(&self) -> u32 {
        self.acquired
    }

    /// Returns the number of permits held by `actor`.
    pub(crate) fn held_by(&self, actor: ActorId) -> u32 {
        self.per_actor.get(&actor).copied().unwrap_or(0)
    }

    /// Returns the number of actors currently holding permits.
    pub(crate) fn holder_count(&self) -> usize {
        self.per_actor.len()
    }

    /// Hands `permits` additional permits to `actor`.
    ///
    /// The caller has already checked capacity; the ledger only counts.
    pub(crate) fn charge(&mut self, actor: ActorId, permits: u32) {
        debug_assert!(permits > 0);
        self.acquired += permits;
        *self.per_actor.entry(actor).or_insert(0) += permits;
    }

    /// Takes `permits` permits back from `actor`.
    ///
    /// The caller has already verified the actor holds at least that
    /// many. Entries that reach zero are removed.
    pub(crate) fn credit(&mut self, actor: ActorId, permits: u32) {
        let held = self.held_by(actor);
        debug_assert!(permits <= held);
        self.acquired -= permits;
        let remaining = held - permits;
        if remaining == 0 {
            self.per_actor.remove(&actor);
        } else {
            self.per_actor.insert(actor, remaining);
        }
    }
}
