/*!
 * Managed Collection Lock
 * Scoped ownership of acquired latches with deterministic release
 */

use crate::core::sync::CollectionLatch;
use crate::core::types::LockMode;
use crate::path::CollectionPath;
use crate::table::LockTable;
use log::{debug, warn};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// One logical hold: a collection path locked in some mode
///
/// Several logical holds may share one physical latch when their paths
/// collide onto the same stripe.
pub(crate) struct LogicalHold {
    pub(crate) path: CollectionPath,
    pub(crate) mode: LockMode,
    /// Index into the traversal's physical hold table
    pub(crate) physical: usize,
}

/// One physical latch acquisition backing one or more logical holds
///
/// `mode` is the strongest mode any sharing logical hold needs; the latch
/// is unlocked once `remaining` logical users have released.
pub(crate) struct PhysicalHold {
    pub(crate) latch: Arc<CollectionLatch>,
    pub(crate) mode: LockMode,
    pub(crate) remaining: usize,
    pub(crate) held: bool,
}

impl PhysicalHold {
    /// Drop one logical user; unlock the latch when the last one leaves
    pub(crate) fn release_logical_user(&mut self) {
        self.remaining -= 1;
        if self.remaining == 0 && self.held {
            self.latch.release(self.mode);
            self.held = false;
        }
    }
}

/// Scoped ownership of the latches acquired for one collection
///
/// Holds the leaf of the traversal and, for parent-locking write
/// acquisitions, the retained direct parent. Dropping the handle releases
/// the logical holds in reverse acquisition order, emitting one `Released`
/// event each; release must happen on the acquiring thread, which the
/// missing `Send` impl enforces at compile time.
pub struct ManagedCollectionLock {
    table: &'static LockTable,
    group_id: u64,
    collection: CollectionPath,
    mode: LockMode,
    /// Remaining logical holds in acquisition order
    logical: Vec<LogicalHold>,
    physical: Vec<PhysicalHold>,
    acquired_at: Instant,
    released: bool,
    _not_send: PhantomData<*const ()>,
}

impl ManagedCollectionLock {
    pub(crate) fn new(
        table: &'static LockTable,
        group_id: u64,
        collection: CollectionPath,
        mode: LockMode,
        logical: Vec<LogicalHold>,
        physical: Vec<PhysicalHold>,
    ) -> Self {
        Self {
            table,
            group_id,
            collection,
            mode,
            logical,
            physical,
            acquired_at: Instant::now(),
            released: false,
            _not_send: PhantomData,
        }
    }

    /// Collection this handle locks (the traversal target)
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Mode the target was acquired in
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Correlation id of the acquisition's event group
    pub fn group_id(&self) -> u64 {
        self.group_id
    }

    /// Release all held latches now
    ///
    /// Idempotent: a second call is a no-op diagnosed at `warn` level
    /// (release is otherwise driven by `Drop`).
    pub fn release(&mut self) {
        if self.released {
            warn!(
                "double release of collection lock on {} (group {})",
                self.collection, self.group_id
            );
            return;
        }
        self.release_inner();
    }

    fn release_inner(&mut self) {
        for hold in self.logical.iter().rev() {
            self.table.released(&hold.path, hold.mode, self.group_id);
            self.physical[hold.physical].release_logical_user();
        }
        self.logical.clear();
        self.released = true;
        debug!(
            "released {} lock on {} after {:.3}s",
            self.mode,
            self.collection,
            self.acquired_at.elapsed().as_secs_f64()
        );
    }
}

impl Drop for ManagedCollectionLock {
    fn drop(&mut self) {
        if !self.released {
            self.release_inner();
        }
    }
}

impl std::fmt::Debug for ManagedCollectionLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedCollectionLock")
            .field("collection", &self.collection)
            .field("mode", &self.mode)
            .field("group_id", &self.group_id)
            .field("held", &self.logical.len())
            .field("released", &self.released)
            .finish()
    }
}
