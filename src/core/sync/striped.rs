/*!
 * Latch Striping
 * Bounded pool of latches keyed by stable path hashing
 */

use crate::core::sync::CollectionLatch;
use std::sync::Arc;

/// Hash-striped latch pool
///
/// A fixed array of `concurrency_level` latches. A key maps to
/// `stripes[hash(key) % len]` with a seed owned by the pool, so the same
/// key always yields the same latch object for the pool's lifetime.
/// Distinct keys may collide onto one stripe; that only reduces
/// parallelism, never correctness, because traversal order is based on
/// path ancestry rather than latch identity.
///
/// Striping caps memory at the stripe count and removes per-path lifetime
/// management; latches are never destroyed while the pool lives.
pub struct LatchPool {
    stripes: Vec<Arc<CollectionLatch>>,
    hasher: ahash::RandomState,
}

impl LatchPool {
    /// Create a pool with `concurrency_level` stripes
    ///
    /// # Panics
    ///
    /// Panics if `concurrency_level` is zero; [`LockManager`] validates the
    /// configured level before constructing pools.
    ///
    /// [`LockManager`]: crate::manager::LockManager
    pub fn new(concurrency_level: u32) -> Self {
        assert!(concurrency_level >= 1, "stripe count must be >= 1");

        let mut stripes = Vec::with_capacity(concurrency_level as usize);
        for _ in 0..concurrency_level {
            stripes.push(Arc::new(CollectionLatch::new()));
        }

        Self {
            stripes,
            hasher: ahash::RandomState::new(),
        }
    }

    /// Get stripe index for a key
    #[inline]
    fn stripe_index(&self, key: &str) -> usize {
        (self.hasher.hash_one(key) % self.stripes.len() as u64) as usize
    }

    /// Latch for `key`; identical keys always return the same latch
    #[inline]
    pub fn get(&self, key: &str) -> Arc<CollectionLatch> {
        Arc::clone(&self.stripes[self.stripe_index(key)])
    }

    /// Number of stripes
    #[inline]
    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }
}
