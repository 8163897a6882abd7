use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::backend::{CollectionPath, DocPath, DocumentBackend, Precondition, Snapshot, Write, WriteBatch};
use crate::error::StoreError;
use crate::suggestion::Suggestion;

#[derive(Debug, Default, Clone)]
struct MemoryState {
    collections: BTreeMap<CollectionPath, BTreeMap<String, Snapshot>>,
    revision: u64,
}

impl MemoryState {
    fn current(&self, path: &DocPath) -> Option<&Snapshot> {
        self.collections
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
    }

    fn holds(&self, write: &Write) -> bool {
        let current = self.current(write.path());
        match write.precondition() {
            Precondition::None => true,
            Precondition::Missing => current.is_none(),
            Precondition::Revision(rev) => current.is_some_and(|s| s.revision == rev),
        }
    }

    fn documents(&self) -> Vec<(DocPath, Suggestion)> {
        self.collections
            .iter()
            .flat_map(|(collection, docs)| {
                docs.iter().map(|(id, snapshot)| {
                    (
                        DocPath {
                            collection: collection.clone(),
                            id: id.clone(),
                        },
                        snapshot.doc.clone(),
                    )
                })
            })
            .collect()
    }

    fn apply(&mut self, write: Write) {
        match write {
            Write::Put { path, doc, .. } => {
                self.revision += 1;
                let revision = self.revision;
                self.collections
                    .entry(path.collection)
                    .or_default()
                    .insert(path.id, Snapshot { doc, revision });
            }
            Write::Delete { path, .. } => {
                if let Some(docs) = self.collections.get_mut(&path.collection) {
                    docs.remove(&path.id);
                    if docs.is_empty() {
                        self.collections.remove(&path.collection);
                    }
                }
            }
        }
    }
}

/// Process-local transactional backend.
///
/// A single mutex serializes commits, so a batch's precondition check and
/// its writes happen as one step.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: impl IntoIterator<Item = (DocPath, Suggestion)>) -> Self {
        let mut state = MemoryState::default();
        for (path, doc) in documents {
            state.apply(Write::Put {
                path,
                doc,
                precondition: Precondition::None,
            });
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Every stored document, ordered by path
    pub fn documents(&self) -> Result<Vec<(DocPath, Suggestion)>, StoreError> {
        Ok(self.lock()?.documents())
    }

    /// Commit `batch` only if `persist` accepts the resulting documents.
    ///
    /// The batch is applied to a copy; a failed `persist` leaves the live
    /// state untouched. Commits stay serialized while `persist` runs.
    pub fn commit_staged<F>(&self, batch: WriteBatch, persist: F) -> Result<(), StoreError>
    where
        F: FnOnce(Vec<(DocPath, Suggestion)>) -> Result<(), StoreError>,
    {
        let mut state = self.lock()?;
        if !batch.writes().iter().all(|w| state.holds(w)) {
            return Err(StoreError::Conflict);
        }
        let mut staged = state.clone();
        for write in batch.into_writes() {
            staged.apply(write);
        }
        persist(staged.documents())?;
        *state = staged;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock()
            .map(|state| state.collections.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory backend lock poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.lock()?.current(path).cloned())
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Snapshot>, StoreError> {
        Ok(self
            .lock()?
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !batch.writes().iter().all(|w| state.holds(w)) {
            return Err(StoreError::Conflict);
        }
        for write in batch.into_writes() {
            state.apply(write);
        }
        Ok(())
    }
}
