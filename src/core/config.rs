/*!
 * Locking Configuration
 *
 * Runtime configuration for the lock manager
 */

use crate::core::limits::{DEFAULT_CONCURRENCY_LEVEL, EVENT_QUEUE_CAPACITY};
use serde::Deserialize;
use std::time::Duration;

/// Lock manager configuration
///
/// Validated by [`LockManager::with_config`](crate::manager::LockManager):
/// a zero `concurrency_level` or zero `event_queue_capacity` is rejected at
/// construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct LockingConfig {
    /// Stripe count for the latch pools
    pub concurrency_level: u32,
    /// Per-acquisition deadline applied to each latch step; `None` waits
    /// indefinitely
    pub lock_timeout: Option<Duration>,
    /// Bounded capacity of the lock table's event queue
    pub event_queue_capacity: usize,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            concurrency_level: DEFAULT_CONCURRENCY_LEVEL,
            lock_timeout: None,
            event_queue_capacity: EVENT_QUEUE_CAPACITY,
        }
    }
}

impl LockingConfig {
    /// Configuration for embedded deployments with few concurrent sessions
    pub const fn embedded() -> Self {
        Self {
            concurrency_level: 16,
            lock_timeout: None,
            event_queue_capacity: 512,
        }
    }

    /// Set the per-acquisition deadline
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Set the stripe count
    pub fn with_concurrency_level(mut self, level: u32) -> Self {
        self.concurrency_level = level;
        self
    }
}
