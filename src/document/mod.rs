/*!
 * Document Sets
 * Collections of document ids handed to the per-document lock API
 */

use crate::core::sync::CollectionLatch;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Identifier of a stored XML document, unique within the database
pub type DocumentId = u64;

/// Per-document latch registry
///
/// Unlike the collection pool, document latches are not striped: the
/// deadlock-freedom of set locking rests on acquiring latches in ascending
/// id order, which requires exactly one latch per id. Latches are created
/// on first use and live for the registry's lifetime, mirroring the
/// per-document update locks of the storage layer.
#[derive(Debug, Default)]
pub struct DocumentLatches {
    latches: DashMap<DocumentId, Arc<CollectionLatch>>,
}

impl DocumentLatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch for `id`, created on first use
    pub fn get(&self, id: DocumentId) -> Arc<CollectionLatch> {
        Arc::clone(
            &self
                .latches
                .entry(id)
                .or_insert_with(|| Arc::new(CollectionLatch::new())),
        )
    }

    /// Number of documents that have ever been latched
    pub fn len(&self) -> usize {
        self.latches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latches.is_empty()
    }
}

/// A set of documents to be locked or unlocked as a unit
///
/// Query execution assembles sets of candidate documents and locks them
/// all before evaluation. The manager always acquires in ascending id
/// order regardless of the set's own iteration order, so overlapping sets
/// locked by concurrent threads cannot deadlock.
pub trait DocumentSet: Send + Sync {
    /// Ids of the member documents, in any order
    fn document_ids(&self) -> Vec<DocumentId>;

    fn contains(&self, id: DocumentId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered-set implementation backing most callers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultDocumentSet {
    ids: BTreeSet<DocumentId>,
}

impl DefaultDocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document; returns `false` if it was already present
    pub fn insert(&mut self, id: DocumentId) -> bool {
        self.ids.insert(id)
    }

    pub fn remove(&mut self, id: DocumentId) -> bool {
        self.ids.remove(&id)
    }

    /// Iterate ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.ids.iter().copied()
    }
}

impl DocumentSet for DefaultDocumentSet {
    fn document_ids(&self) -> Vec<DocumentId> {
        self.ids.iter().copied().collect()
    }

    fn contains(&self, id: DocumentId) -> bool {
        self.ids.contains(&id)
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

impl FromIterator<DocumentId> for DefaultDocumentSet {
    fn from_iter<I: IntoIterator<Item = DocumentId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

impl Extend<DocumentId> for DefaultDocumentSet {
    fn extend<I: IntoIterator<Item = DocumentId>>(&mut self, iter: I) {
        self.ids.extend(iter);
    }
}
