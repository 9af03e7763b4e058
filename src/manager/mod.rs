/*!
 * Lock Manager
 * Orchestrates lock-coupling traversal over the collection hierarchy
 *
 * Acquiring a collection lock walks the ancestor chain root→leaf,
 * acquiring each latch before releasing its parent ("crabbing"), so a
 * descent is always covered by at least one held latch and concurrent
 * traversals cannot deadlock: everyone descends in the same order. At most
 * two latches are held per thread at any instant.
 */

mod handle;

pub use handle::ManagedCollectionLock;

use crate::core::config::LockingConfig;
use crate::core::errors::{LockError, Result};
use crate::core::sync::{CollectionLatch, LatchPool};
use crate::core::types::{current_thread_token, LockMode};
use crate::document::{DocumentId, DocumentLatches, DocumentSet};
use crate::path::CollectionPath;
use crate::table::LockTable;
use handle::{LogicalHold, PhysicalHold};
use log::debug;
use std::sync::Arc;
use std::time::Instant;

/// One step of a planned traversal
struct PlanStep {
    path: CollectionPath,
    mode: LockMode,
    /// Kept in the handle instead of being couple-released
    retained: bool,
    /// Index into the physical hold table
    physical: usize,
}

/// Top-level lock API for the collection namespace
///
/// Thread-safe; any number of sessions may acquire concurrently.
/// Collection latches come from a fixed hash-striped pool, so their memory
/// is bounded by the concurrency level and latch identity is stable for
/// the manager's lifetime; document latches are allocated per document id.
pub struct LockManager {
    collection_latches: LatchPool,
    document_latches: DocumentLatches,
    table: &'static LockTable,
    config: LockingConfig,
}

impl LockManager {
    /// Create a manager with `concurrency_level` stripes per pool
    pub fn new(concurrency_level: u32) -> Result<Self> {
        Self::with_config(&LockingConfig::default().with_concurrency_level(concurrency_level))
    }

    /// Create a manager from a full configuration
    pub fn with_config(config: &LockingConfig) -> Result<Self> {
        if config.concurrency_level == 0 {
            return Err(LockError::Configuration(
                "concurrency_level must be >= 1".to_string(),
            ));
        }
        if config.event_queue_capacity == 0 {
            return Err(LockError::Configuration(
                "event_queue_capacity must be >= 1".to_string(),
            ));
        }

        Ok(Self {
            collection_latches: LatchPool::new(config.concurrency_level),
            document_latches: DocumentLatches::new(),
            table: LockTable::instance_with_capacity(config.event_queue_capacity),
            config: config.clone(),
        })
    }

    /// Acquire a READ lock on `path`, coupling down the ancestor chain
    ///
    /// The returned handle holds the target; every ancestor was released
    /// as soon as its child was acquired.
    pub fn acquire_collection_read_lock(&self, path: &str) -> Result<ManagedCollectionLock> {
        let target = CollectionPath::new(path)?;
        self.acquire_hierarchy(target, LockMode::Read, false)
    }

    /// Acquire a WRITE lock on `path`
    ///
    /// Ancestors are READ-coupled. With `lock_parent` the direct parent is
    /// WRITE-acquired and retained in the handle alongside the target
    /// (needed by operations that mutate the parent's child list, e.g.
    /// create/remove/rename of a sub-collection). A root target takes a
    /// single WRITE lock regardless of `lock_parent`.
    pub fn acquire_collection_write_lock(
        &self,
        path: &str,
        lock_parent: bool,
    ) -> Result<ManagedCollectionLock> {
        let target = CollectionPath::new(path)?;
        self.acquire_hierarchy(target, LockMode::Write, lock_parent)
    }

    /// Raw latch for a collection path (diagnostics and tests)
    pub fn get_collection_latch(&self, path: &str) -> Result<Arc<CollectionLatch>> {
        let path = CollectionPath::new(path)?;
        Ok(self.collection_latches.get(path.as_str()))
    }

    /// Raw latch for a document id (diagnostics and tests)
    pub fn get_document_latch(&self, id: DocumentId) -> Arc<CollectionLatch> {
        self.document_latches.get(id)
    }

    /// Lock every document in `documents`
    ///
    /// Latches are acquired in ascending id order, so concurrent callers
    /// locking overlapping sets cannot deadlock. On timeout every latch
    /// acquired so far is released in reverse and the error surfaces.
    pub fn lock_documents(&self, documents: &dyn DocumentSet, exclusive: bool) -> Result<()> {
        let mode = if exclusive { LockMode::Write } else { LockMode::Read };
        let deadline = self.deadline();
        let ids = ordered_ids(documents);

        let mut acquired: Vec<Arc<CollectionLatch>> = Vec::with_capacity(ids.len());
        for id in ids {
            let latch = self.document_latches.get(id);
            if !latch.acquire(mode, deadline) {
                for held in acquired.iter().rev() {
                    held.release(mode);
                }
                return Err(LockError::Timeout {
                    path: format!("document {id}"),
                    mode,
                });
            }
            acquired.push(latch);
        }
        Ok(())
    }

    /// Unlock the documents in `documents` that the calling thread still
    /// holds in the requested mode
    ///
    /// Holds are queried per latch before release, so unlocking a superset
    /// of what was locked (or unlocking twice) is harmless.
    pub fn unlock_documents(&self, documents: &dyn DocumentSet, exclusive: bool) {
        let me = current_thread_token();
        for id in ordered_ids(documents).into_iter().rev() {
            let latch = self.document_latches.get(id);
            if exclusive {
                if latch.is_held_for_write_by(me) {
                    latch.release_write();
                }
            } else if latch.is_held_for_read_by(me) {
                latch.release_read();
            }
        }
    }

    /// Configured per-acquisition deadline, evaluated at call time
    #[inline]
    fn deadline(&self) -> Option<Instant> {
        self.config.lock_timeout.map(|timeout| Instant::now() + timeout)
    }

    /// Walk the ancestor chain of `target` top-down with lock coupling
    fn acquire_hierarchy(
        &self,
        target: CollectionPath,
        target_mode: LockMode,
        lock_parent: bool,
    ) -> Result<ManagedCollectionLock> {
        let chain = target.ancestors();
        let (steps, mut physical) = self.plan(&chain, target_mode, lock_parent);

        let group_id = self.table.next_group_id();
        let deadline = self.deadline();
        // Step indices logically held right now, in acquisition order;
        // coupling keeps this at one or two entries
        let mut held: Vec<usize> = Vec::with_capacity(2);

        for index in 0..steps.len() {
            let (path, mode, slot) = {
                let step = &steps[index];
                (step.path.clone(), step.mode, step.physical)
            };

            self.table.attempt(&path, mode, group_id);
            if !physical[slot].held {
                if !physical[slot].latch.acquire(physical[slot].mode, deadline) {
                    self.table
                        .acquire_failed(&path, mode, group_id, "deadline elapsed");
                    self.unwind(&steps, &mut physical, &held, group_id);
                    return Err(LockError::Timeout {
                        path: path.to_string(),
                        mode,
                    });
                }
                physical[slot].held = true;
            }
            self.table.acquired(&path, mode, group_id);
            held.push(index);

            // Couple: the child is now held, release its parent unless the
            // plan retains it
            if index > 0 && !steps[index - 1].retained {
                let prev = index - 1;
                held.retain(|&i| i != prev);
                let step = &steps[prev];
                self.table.released(&step.path, step.mode, group_id);
                physical[step.physical].release_logical_user();
            }
        }

        let logical = held
            .iter()
            .map(|&index| {
                let step = &steps[index];
                LogicalHold {
                    path: step.path.clone(),
                    mode: step.mode,
                    physical: step.physical,
                }
            })
            .collect();

        debug!("acquired {target_mode} lock on {target} (group {group_id})");
        Ok(ManagedCollectionLock::new(
            self.table,
            group_id,
            target,
            target_mode,
            logical,
            physical,
        ))
    }

    /// Assign modes and physical latches to every step of the chain
    ///
    /// Ancestor/descendant paths colliding onto one stripe share a
    /// physical slot: the latch is acquired once in the strongest mode any
    /// sharing step needs and unlocked when the last of them releases,
    /// while events are still emitted once per logical path. This keeps
    /// collisions from ever requiring a read→write upgrade mid-traversal.
    fn plan(
        &self,
        chain: &[CollectionPath],
        target_mode: LockMode,
        lock_parent: bool,
    ) -> (Vec<PlanStep>, Vec<PhysicalHold>) {
        let last = chain.len() - 1;
        let mut steps = Vec::with_capacity(chain.len());
        let mut physical: Vec<PhysicalHold> = Vec::with_capacity(chain.len());

        for (index, path) in chain.iter().enumerate() {
            let is_target = index == last;
            let is_parent = index + 1 == last;
            let (mode, retained) = match target_mode {
                LockMode::Read => (LockMode::Read, is_target),
                LockMode::Write if is_target => (LockMode::Write, true),
                LockMode::Write if lock_parent && is_parent => (LockMode::Write, true),
                LockMode::Write => (LockMode::Read, false),
            };

            let latch = self.collection_latches.get(path.as_str());
            let slot = match physical
                .iter()
                .position(|hold| Arc::ptr_eq(&hold.latch, &latch))
            {
                Some(slot) => {
                    physical[slot].mode = physical[slot].mode.max(mode);
                    physical[slot].remaining += 1;
                    slot
                }
                None => {
                    physical.push(PhysicalHold {
                        latch,
                        mode,
                        remaining: 1,
                        held: false,
                    });
                    physical.len() - 1
                }
            };

            steps.push(PlanStep {
                path: path.clone(),
                mode,
                retained,
                physical: slot,
            });
        }

        (steps, physical)
    }

    /// Release everything still held after a failed acquisition, newest
    /// first, emitting one `Released` per logical hold
    fn unwind(
        &self,
        steps: &[PlanStep],
        physical: &mut [PhysicalHold],
        held: &[usize],
        group_id: u64,
    ) {
        for &index in held.iter().rev() {
            let step = &steps[index];
            self.table.released(&step.path, step.mode, group_id);
            physical[step.physical].release_logical_user();
        }
    }
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("concurrency_level", &self.config.concurrency_level)
            .field("lock_timeout", &self.config.lock_timeout)
            .finish()
    }
}

/// Ascending, deduplicated document ids — the global acquisition order
fn ordered_ids(documents: &dyn DocumentSet) -> Vec<DocumentId> {
    let mut ids = documents.document_ids();
    ids.sort_unstable();
    ids.dedup();
    ids
}
