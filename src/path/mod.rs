/*!
 * Collection Paths
 * Canonical absolute identifiers for the hierarchical collection namespace
 */

use crate::core::errors::{LockError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The root collection segment every path must live under
pub const ROOT_COLLECTION: &str = "/db";

/// Canonical, absolute collection path under [`ROOT_COLLECTION`]
///
/// Canonicalization trims trailing slashes; equality is by canonical
/// string. Empty segments and paths outside `/db` are rejected with
/// [`LockError::InvalidPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Canonicalize `raw` into a collection path
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_end_matches('/');
        if trimmed == ROOT_COLLECTION {
            return Ok(Self(ROOT_COLLECTION.to_string()));
        }

        let relative = trimmed
            .strip_prefix("/db/")
            .ok_or_else(|| LockError::InvalidPath(raw.to_string()))?;
        if relative.is_empty() || relative.split('/').any(str::is_empty) {
            return Err(LockError::InvalidPath(raw.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// The root collection path `/db`
    pub fn root() -> Self {
        Self(ROOT_COLLECTION.to_string())
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_COLLECTION
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parent collection, `None` for the root
    pub fn parent(&self) -> Option<CollectionPath> {
        if self.is_root() {
            return None;
        }
        let cut = self.0.rfind('/').expect("canonical path contains '/'");
        Some(Self(self.0[..cut].to_string()))
    }

    /// Ancestor chain root→leaf, inclusive of both ends
    ///
    /// `/db/colA/colB` yields `["/db", "/db/colA", "/db/colA/colB"]`; the
    /// root yields just itself. This chain drives the top-down coupling
    /// traversal: ancestors are always locked strictly before descendants.
    pub fn ancestors(&self) -> Vec<CollectionPath> {
        let mut chain = vec![CollectionPath::root()];
        // Slashes at 0 and 3 delimit the root itself; later ones bound the
        // intermediate ancestors
        for (idx, _) in self
            .0
            .match_indices('/')
            .filter(|(idx, _)| *idx > ROOT_COLLECTION.len())
        {
            chain.push(Self(self.0[..idx].to_string()));
        }
        if !self.is_root() {
            chain.push(self.clone());
        }
        chain
    }

    /// Number of segments below the root; the root itself has depth 0
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count() - 1
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CollectionPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
