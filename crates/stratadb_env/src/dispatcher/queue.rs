//! Arrival-ordered waiter queues.

use crate::types::ActorId;
use std::collections::BTreeMap;

/// A queue of waiting actors ordered by arrival.
///
/// Keys are order values from the dispatcher's single monotonic
/// counter, so they are unique across both queues and a ticket keeps
/// its position when moved between them. Lookup of the front key and
/// removal by key are both needed: a timed waiter that gives up may no
/// longer be at the front.
#[derive(Debug, Default)]
pub(crate) struct WaiterQueue {
    entries: BTreeMap<u64, ActorId>,
}

impl WaiterQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enqueues an actor under the given order key.
    pub(crate) fn enqueue(&mut self, order: u64, actor: ActorId) {
        let evicted = self.entries.insert(order, actor);
        debug_assert!(evicted.is_none(), "order keys must be unique");
    }

    /// Returns the order key of the longest-waiting actor.
    pub(crate) fn front(&self) -> Option<u64> {
        self.entries.keys().next().copied()
    }

    /// Removes and returns the longest-waiting entry.
    pub(crate) fn dequeue_front(&mut self) -> Option<(u64, ActorId)> {
        self.entries.pop_first()
    }

    /// Removes the entry with the given order key, wherever it sits.
    pub(crate) fn remove(&mut self, order: u64) -> Option<ActorId> {
        self.entries.remove(&order)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
