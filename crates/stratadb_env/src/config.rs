//! Environment configuration.

use std::time::Duration;

/// Configuration for the transaction environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of transactions that may hold permits at once.
    ///
    /// This is the dispatcher's total permit capacity; an exclusive
    /// transaction takes all of it.
    pub max_concurrent_txns: u32,

    /// How long a GC transaction may wait for exclusive permits before
    /// settling for fewer.
    pub gc_acquire_timeout: Duration,

    /// How long a replayed transaction may wait for exclusive permits
    /// before settling for fewer.
    pub replay_acquire_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_txns: 16,
            gc_acquire_timeout: Duration::from_millis(1000),
            replay_acquire_timeout: Duration::from_millis(2000),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of concurrent transactions.
    #[must_use]
    pub const fn max_concurrent_txns(mut self, value: u32) -> Self {
        self.max_concurrent_txns = value;
        self
    }

    /// Sets the GC exclusive-acquire timeout.
    #[must_use]
    pub const fn gc_acquire_timeout(mut self, value: Duration) -> Self {
        self.gc_acquire_timeout = value;
        self
    }

    /// Sets the replay exclusive-acquire timeout.
    #[must_use]
    pub const fn replay_acquire_timeout(mut self, value: Duration) -> Self {
        self.replay_acquire_timeout = value;
        self
    }
}
