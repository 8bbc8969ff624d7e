//! Reentrant transaction dispatching.
//!
//! The dispatcher bounds how many transactions run against the
//! environment at once by handing out permits from a fixed pool:
//! - **Regular** acquisitions cost one permit and are served strictly
//!   FIFO among themselves.
//! - **Exclusive** acquisitions raise an actor's holding to the whole
//!   pool; one stuck at the head of the line is shuffled to its own
//!   queue so regular traffic can keep flowing.
//! - Acquisition is **reentrant**: an actor holding permits can take
//!   more without waiting on itself, up to the pool size.
//!
//! Callers pass the granted permit count back to [`release`] when the
//! transaction finishes; the dispatcher only counts and never runs
//! anything itself.
//!
//! [`release`]: TransactionDispatcher::release

mod ledger;
mod manager;
mod queue;

pub use manager::TransactionDispatcher;
