//! Shared test utilities for muster
//!
//! This module provides common test fixtures and helper functions
//! used across multiple test modules.

#[cfg(test)]
pub mod test_helpers {
    use std::collections::HashSet;
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::error::StoreError;
    use crate::store::{
        CollectionPath, DocPath, DocumentBackend, MemoryBackend, RemoteSuggestionStore, Snapshot,
        WriteBatch,
    };
    use crate::suggestion::{Scope, Suggestion, SuggestionKind};

    /// Helper to run async tests on a single-threaded tokio runtime
    pub fn run_async<F: Future>(f: F) -> F::Output {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to create tokio runtime");
        rt.block_on(f)
    }

    /// Helper to run async tests on a multi-threaded tokio runtime
    pub fn run_multi_thread<F: Future>(f: F) -> F::Output {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .expect("Failed to create tokio runtime");
        rt.block_on(f)
    }

    /// Scope used by most fixtures
    pub fn test_scope() -> Scope {
        Scope::new("Games Workshop", "Warhammer 40K")
    }

    /// Faction suggestion in the normalized test scope, last used now
    pub fn suggestion(original: &str, count: u64) -> Suggestion {
        let scope = test_scope()
            .validated(crate::suggestion::SuggestionType::Faction)
            .expect("test scope is valid");
        let mut s = Suggestion::first_use(original, SuggestionKind::Faction, &scope, Utc::now());
        s.count = count;
        s
    }

    pub fn memory_store() -> (Arc<MemoryBackend>, RemoteSuggestionStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = RemoteSuggestionStore::new(backend.clone());
        (backend, store)
    }

    /// Memory backend with injectable failures and latency
    #[derive(Debug, Default)]
    pub struct FlakyBackend {
        pub inner: MemoryBackend,
        /// Yield to the scheduler after every read to widen the read-commit window
        pub yield_on_read: AtomicBool,
        /// Commits touching these document ids fail as unavailable
        pub failing_ids: Mutex<HashSet<String>>,
        /// Every list call fails as unavailable
        pub fail_lists: AtomicBool,
        /// Extra latency added to list calls
        pub list_delay: Mutex<Option<Duration>>,
        /// Latency between reading a list and returning it
        pub list_settle: Mutex<Option<Duration>>,
        pub commits: AtomicUsize,
        pub lists: AtomicUsize,
    }

    impl FlakyBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn yielding() -> Self {
            let backend = Self::default();
            backend.yield_on_read.store(true, Ordering::SeqCst);
            backend
        }

        pub fn fail_id(&self, id: &str) {
            self.failing_ids.lock().unwrap().insert(id.to_string());
        }

        pub fn heal_id(&self, id: &str) {
            self.failing_ids.lock().unwrap().remove(id);
        }

        pub fn set_list_delay(&self, delay: Option<Duration>) {
            *self.list_delay.lock().unwrap() = delay;
        }

        pub fn set_list_settle(&self, delay: Option<Duration>) {
            *self.list_settle.lock().unwrap() = delay;
        }
    }

    #[async_trait]
    impl DocumentBackend for FlakyBackend {
        async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>, StoreError> {
            let snapshot = self.inner.get(path).await;
            if self.yield_on_read.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
            snapshot
        }

        async fn list(&self, collection: &CollectionPath) -> Result<Vec<Snapshot>, StoreError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            let delay = *self.list_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_lists.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected list failure".to_string()));
            }
            let snapshots = self.inner.list(collection).await;
            let settle = *self.list_settle.lock().unwrap();
            if let Some(settle) = settle {
                tokio::time::sleep(settle).await;
            }
            snapshots
        }

        async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            let failing = {
                let ids = self.failing_ids.lock().unwrap();
                batch.writes().iter().any(|w| ids.contains(&w.path().id))
            };
            if failing {
                return Err(StoreError::Unavailable("injected commit failure".to_string()));
            }
            self.inner.commit(batch).await
        }
    }
}
