//! Dispatcher statistics and telemetry.
//!
//! Provides metrics counters for monitoring permit traffic through the
//! transaction dispatcher.
//!
//! # Usage
//!
//! ```rust,ignore
//! use stratadb_env::TransactionDispatcher;
//!
//! let dispatcher = TransactionDispatcher::new(16)?;
//!
//! // Perform acquisitions...
//!
//! let stats = dispatcher.stats();
//! println!("Acquires: {}", stats.acquires());
//! println!("Promotions: {}", stats.promotions());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Dispatcher statistics and metrics.
///
/// All counters are atomic and can be read while acquisitions are in
/// progress. Values are monotonically increasing.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Total single-permit grants (including downgraded exclusives).
    acquires: AtomicU64,
    /// Total full-capacity exclusive grants.
    exclusive_acquires: AtomicU64,
    /// Total release calls that returned permits.
    releases: AtomicU64,
    /// Exclusive waiters shuffled from the regular to the exclusive queue.
    promotions: AtomicU64,
    /// Exclusive acquisitions that settled for a single permit.
    downgrades: AtomicU64,
    /// Timed acquisitions that gave up with no permits granted.
    timeouts: AtomicU64,
}

impl DispatcherStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    /// Records a single-permit grant.
    pub(crate) fn record_acquire(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a full-capacity exclusive grant.
    pub(crate) fn record_exclusive_acquire(&self) {
        self.exclusive_acquires.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a release.
    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a promotion to the exclusive queue.
    pub(crate) fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an exclusive-to-regular downgrade.
    pub(crate) fn record_downgrade(&self) {
        self.downgrades.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a timed acquisition that expired empty-handed.
    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    // === Getter methods (public API) ===

    /// Returns the total number of single-permit grants.
    pub fn acquires(&self) -> u64 {
        self.acquires.load(Ordering::Relaxed)
    }

    /// Returns the total number of full-capacity exclusive grants.
    pub fn exclusive_acquires(&self) -> u64 {
        self.exclusive_acquires.load(Ordering::Relaxed)
    }

    /// Returns the total number of releases.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    /// Returns the total number of promotions to the exclusive queue.
    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }

    /// Returns the total number of exclusive-to-regular downgrades.
    pub fn downgrades(&self) -> u64 {
        self.downgrades.load(Ordering::Relaxed)
    }

    /// Returns the total number of expired timed acquisitions.
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            acquires: self.acquires(),
            exclusive_acquires: self.exclusive_acquires(),
            releases: self.releases(),
            promotions: self.promotions(),
            downgrades: self.downgrades(),
            timeouts: self.timeouts(),
        }
    }
}

/// A point-in-time snapshot of dispatcher statistics.
///
/// Unlike `DispatcherStats`, this is a simple struct that can be
/// compared or passed across threads without atomics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Total single-permit grants.
    pub acquires: u64,
    /// Total full-capacity exclusive grants.
    pub exclusive_acquires: u64,
    /// Total releases.
    pub releases: u64,
    /// Total promotions to the exclusive queue.
    pub promotions: u64,
    /// Total exclusive-to-regular downgrades.
    pub downgrades: u64,
    /// Total expired timed acquisitions.
    pub timeouts: u64,
}
