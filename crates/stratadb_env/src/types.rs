//! Core type definitions for the environment layer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Next id handed out by [`ActorId::current`].
static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_ACTOR: ActorId = ActorId::new(NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed));
}

/// Identity of a concurrent actor, the unit of permit accounting.
///
/// The dispatcher keys reentrancy on this value: permits acquired under
/// the same `ActorId` stack up, and additional acquisitions by an actor
/// that already holds permits never wait on themselves. An `ActorId` is
/// opaque; the dispatcher only compares and hashes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(pub u64);

impl ActorId {
    /// Creates an actor ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the identity of the calling thread.
    ///
    /// Each OS thread is assigned a distinct id on first use; repeated
    /// calls from the same thread return the same value for the life of
    /// the thread.
    #[must_use]
    pub fn current() -> Self {
        CURRENT_ACTOR.with(|id| *id)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor:{}", self.0)
    }
}
