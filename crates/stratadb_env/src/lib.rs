//! # StrataDB Environment
//!
//! Transaction environment layer for StrataDB.
//!
//! This crate provides:
//! - [`TransactionDispatcher`], the reentrant permit coordinator that
//!   bounds concurrent transactions against an environment
//! - [`Transaction`], the permit-accounting handle admitted by it
//! - [`Config`] for capacity and acquisition timeouts
//! - [`DispatcherStats`] traffic counters
//!
//! The storage engine, directory adapters, and entity iterators sit
//! above this layer and interact with it only through acquire/release.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dispatcher;
mod error;
mod stats;
mod transaction;
mod types;

pub use config::Config;
pub use dispatcher::TransactionDispatcher;
pub use error::{EnvError, EnvResult};
pub use stats::{DispatcherStats, StatsSnapshot};
pub use transaction::Transaction;
pub use types::ActorId;
