/*!
 * Synchronization Primitives
 *
 * The two building blocks of the lock manager:
 * - [`CollectionLatch`]: a reentrant multi-reader/single-writer latch with
 *   per-thread hold tracking and deadline support
 * - [`LatchPool`]: a fixed, hash-striped pool of latches keyed by path
 *
 * Latches are writer-preferring: once a writer is queued, new foreign
 * readers wait. Threads that already hold a latch bypass the barrier, so
 * reentrant acquisition never self-deadlocks.
 */

mod latch;
mod striped;

pub use latch::CollectionLatch;
pub use striped::LatchPool;
