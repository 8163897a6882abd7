//! Document backend abstraction
//!
//! The store talks to persistence through [`DocumentBackend`]: point reads,
//! collection listing and an all-or-nothing batch commit guarded by
//! per-write preconditions. That is enough to build optimistic
//! read-modify-write transactions on top.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::normalize::to_storage_segment;
use crate::suggestion::{Scope, Suggestion, SuggestionType};

/// `{kind}s/{manufacturer}_{game}[_{faction}]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionPath {
    pub kind: SuggestionType,
    pub scope_key: String,
}

impl CollectionPath {
    /// `scope` must already be validated for `kind`
    pub fn new(kind: SuggestionType, scope: &Scope) -> Self {
        Self {
            kind,
            scope_key: scope.collection_key(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.collection(), self.scope_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    pub collection: CollectionPath,
    pub id: String,
}

impl DocPath {
    pub fn new(kind: SuggestionType, scope: &Scope, name: &str) -> Self {
        Self {
            collection: CollectionPath::new(kind, scope),
            id: to_storage_segment(name),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document together with the revision it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub doc: Suggestion,
    pub revision: u64,
}

/// Condition a write requires of the current document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    /// The document must not exist
    Missing,
    /// The document must still be at this revision
    Revision(u64),
}

#[derive(Debug, Clone)]
pub enum Write {
    Put {
        path: DocPath,
        doc: Suggestion,
        precondition: Precondition,
    },
    Delete {
        path: DocPath,
        precondition: Precondition,
    },
}

impl Write {
    pub fn path(&self) -> &DocPath {
        match self {
            Write::Put { path, .. } | Write::Delete { path, .. } => path,
        }
    }

    pub fn precondition(&self) -> Precondition {
        match self {
            Write::Put { precondition, .. } | Write::Delete { precondition, .. } => *precondition,
        }
    }
}

/// Writes committed together or not at all
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, path: DocPath, doc: Suggestion, precondition: Precondition) {
        self.writes.push(Write::Put {
            path,
            doc,
            precondition,
        });
    }

    pub fn delete(&mut self, path: DocPath, precondition: Precondition) {
        self.writes.push(Write::Delete { path, precondition });
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>, StoreError>;

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Snapshot>, StoreError>;

    /// Apply every write or none of them.
    ///
    /// Returns [`StoreError::Conflict`] when any precondition no longer holds.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
