use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::backend::{CollectionPath, DocPath, DocumentBackend, Snapshot, WriteBatch};
use super::memory::MemoryBackend;
use crate::error::StoreError;
use crate::suggestion::Suggestion;

const DATA_DIR: &str = "muster";
const DATA_FILE: &str = "suggestions.json";

#[derive(Deserialize, Serialize)]
struct DataFile {
    #[serde(default)]
    documents: Vec<StoredDocument>,
}

#[derive(Deserialize, Serialize)]
struct StoredDocument {
    collection: CollectionPath,
    id: String,
    doc: Suggestion,
}

pub fn default_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join(DATA_DIR).join(DATA_FILE))
}

/// [`MemoryBackend`] persisted to a JSON file after every commit.
///
/// No file locking - last writer wins if multiple processes share a file.
#[derive(Debug)]
pub struct FileBackend {
    inner: MemoryBackend,
    path: PathBuf,
}

impl FileBackend {
    /// Open the data file, starting empty when it does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let inner = match fs::read_to_string(&path) {
            Ok(contents) => {
                let file: DataFile = serde_json::from_str(&contents)?;
                log::debug!(
                    "Loaded {} suggestion documents from {:?}",
                    file.documents.len(),
                    path
                );
                MemoryBackend::from_documents(file.documents.into_iter().map(|d| {
                    (
                        DocPath {
                            collection: d.collection,
                            id: d.id,
                        },
                        d.doc,
                    )
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryBackend::new(),
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        };

        Ok(Self { inner, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, documents: Vec<(DocPath, Suggestion)>) -> Result<(), StoreError> {
        let documents = documents
            .into_iter()
            .map(|(path, doc)| StoredDocument {
                collection: path.collection,
                id: path.id,
                doc,
            })
            .collect();
        let content = serde_json::to_string_pretty(&DataFile { documents })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        fs::rename(&staging, &self.path).map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl DocumentBackend for FileBackend {
    async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>, StoreError> {
        self.inner.get(path).await
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Snapshot>, StoreError> {
        self.inner.list(collection).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.inner
            .commit_staged(batch, |documents| self.persist(documents))
    }
}
