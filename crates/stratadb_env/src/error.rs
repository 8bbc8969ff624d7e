//! Error types for the StrataDB environment layer.

use crate::types::ActorId;
use thiserror::Error;

/// Result type for environment operations.
pub type EnvResult<T> = Result<T, EnvError>;

/// Errors that can occur in environment operations.
///
/// All of these indicate misuse by the caller, not recoverable runtime
/// conditions. Dispatcher state is unchanged after any error return.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Dispatcher was constructed with zero capacity.
    #[error("max concurrent transactions must be at least 1, got {capacity}")]
    InvalidCapacity {
        /// The rejected capacity value.
        capacity: u32,
    },

    /// An actor attempted to hold more permits than the dispatcher has.
    #[error("no more permits are available to acquire a transaction: {actor} already holds {held}")]
    CapacityExhausted {
        /// The actor at fault.
        actor: ActorId,
        /// Permits the actor already holds (equal to the total capacity).
        held: u32,
    },

    /// An actor attempted to release more permits than it holds.
    #[error("can't release more permits than were acquired: {actor} holds {held}, tried to release {permits}")]
    OverRelease {
        /// The actor at fault.
        actor: ActorId,
        /// Permits the actor actually holds.
        held: u32,
        /// Permits the caller tried to release.
        permits: u32,
    },
}

impl EnvError {
    /// Creates an invalid capacity error.
    pub fn invalid_capacity(capacity: u32) -> Self {
        Self::InvalidCapacity { capacity }
    }

    /// Creates a capacity exhausted error.
    pub fn capacity_exhausted(actor: ActorId, held: u32) -> Self {
        Self::CapacityExhausted { actor, held }
    }

    /// Creates an over-release error.
    pub fn over_release(actor: ActorId, held: u32, permits: u32) -> Self {
        Self::OverRelease {
            actor,
            held,
            permits,
        }
    }
}
