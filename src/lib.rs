/*!
 * Xylem Collection Lock Manager
 * Serializes concurrent access to the hierarchical collection namespace
 *
 * Every read or write touching a collection or its documents goes through
 * the [`LockManager`]: a striped pool of reader-writer latches traversed
 * top-down with lock coupling, a process-wide [`LockTable`] that fans lock
 * events out to diagnostic listeners, and scoped [`ManagedCollectionLock`]
 * handles that release deterministically on drop.
 */

pub mod core;
pub mod document;
pub mod manager;
pub mod path;
pub mod table;

pub use crate::core::config::LockingConfig;
pub use crate::core::errors::{LockError, Result};
pub use crate::core::sync::{CollectionLatch, LatchPool};
pub use crate::core::types::LockMode;
pub use crate::document::{DefaultDocumentSet, DocumentId, DocumentLatches, DocumentSet};
pub use crate::manager::{LockManager, ManagedCollectionLock};
pub use crate::path::CollectionPath;
pub use crate::table::{Action, LockAction, LockEventListener, LockTable, TableStats};
