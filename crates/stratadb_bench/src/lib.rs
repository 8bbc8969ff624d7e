//! Benchmark utilities.

use stratadb_env::ActorId;

/// Generate a batch of distinct actor IDs.
pub fn generate_actors(count: usize) -> Vec<ActorId> {
    (0..count).map(|i| ActorId::new(i as u64 + 1)).collect()
}
