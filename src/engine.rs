//! Suggestion pipeline
//!
//! Ties the store, the local cache, quality filtering and ranking together:
//! cached candidates when fresh, the store otherwise, then filter and rank
//! against what the user typed.

use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::{
    CacheKey, CacheOptions, CacheStats, CacheStore, MemoryCacheStore, SuggestionCache,
};
use crate::error::StoreError;
use crate::normalize::normalize;
use crate::quality::{FilterContext, FilterOptions, apply_filters};
use crate::ranking::rank;
use crate::store::{RecordOutcome, RemoteSuggestionStore, ScopeQuery, UsageEvent};
use crate::suggestion::{Scope, Suggestion, SuggestionType};

pub type BoxedCache = SuggestionCache<Box<dyn CacheStore>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestRequest {
    pub kind: SuggestionType,
    pub scope: Scope,
    pub search_term: String,
}

impl SuggestRequest {
    pub fn new(kind: SuggestionType, scope: Scope, search_term: impl Into<String>) -> Self {
        Self {
            kind,
            scope,
            search_term: search_term.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuggestResponse {
    pub suggestions: Vec<Suggestion>,
    pub source: Source,
    /// Documents in the scope before term matching and filtering, counting
    /// any beyond the cached item cap
    pub total_candidates: usize,
}

pub struct SuggestionEngine {
    store: Arc<RemoteSuggestionStore>,
    cache: Mutex<BoxedCache>,
    filter: FilterOptions,
}

impl SuggestionEngine {
    pub fn new(store: Arc<RemoteSuggestionStore>, cache_store: Box<dyn CacheStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(SuggestionCache::new(cache_store)),
            filter: FilterContext::default().options(),
        }
    }

    /// Engine with a process-local cache
    pub fn in_memory(store: Arc<RemoteSuggestionStore>) -> Self {
        Self::new(store, Box::new(MemoryCacheStore::new()))
    }

    pub fn with_cache_options(self, options: CacheOptions) -> Self {
        let cache = self
            .cache
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        Self {
            store: self.store,
            cache: Mutex::new(SuggestionCache::with_options(cache.into_store(), options)),
            filter: self.filter,
        }
    }

    pub fn with_filter(mut self, options: FilterOptions) -> Self {
        self.filter = options;
        self
    }

    pub fn with_context(self, context: FilterContext) -> Self {
        self.with_filter(context.options())
    }

    pub fn store(&self) -> &Arc<RemoteSuggestionStore> {
        &self.store
    }

    pub fn filter_options(&self) -> &FilterOptions {
        &self.filter
    }

    /// Filtered, ranked suggestions for a partially typed value.
    ///
    /// Validation and store failures are returned; cache trouble only costs
    /// a round trip.
    pub async fn suggest(&self, request: &SuggestRequest) -> Result<SuggestResponse, StoreError> {
        let key = CacheKey::new(request.kind, &request.scope)?;

        let (candidates, total_candidates, source) = match self.with_cache(|cache| cache.get(&key)) {
            Some(entry) => (entry.data, entry.corpus_size, Source::Cache),
            None => {
                let (limit, epoch) =
                    self.with_cache(|cache| (cache.options().max_items, cache.epoch(&key)));
                let query = ScopeQuery::new(request.kind, request.scope.clone()).with_limit(limit);
                let page = self.store.query_page(&query).await?;
                log::debug!(
                    "Fetched {} of {} candidates for {}",
                    page.suggestions.len(),
                    page.total,
                    key
                );
                // A record committed during the fetch leaves the page stale
                if !self
                    .with_cache(|cache| {
                        cache.set_if_current(&key, &page.suggestions, page.total, epoch)
                    })
                    .is_stored()
                {
                    log::debug!("Serving {} uncached", key);
                }
                (page.suggestions, page.total, Source::Remote)
            }
        };

        let matched: Vec<Suggestion> = candidates
            .into_iter()
            .filter(|s| matches_term(s, &request.search_term))
            .collect();

        let mut options = self.filter.clone();
        options.total_candidates.get_or_insert(total_candidates);
        let max_results = options.max_results.take();

        let mut suggestions = rank(&apply_filters(&matched, &options), &request.search_term);
        if let Some(max) = max_results {
            suggestions.truncate(max);
        }

        Ok(SuggestResponse {
            suggestions,
            source,
            total_candidates,
        })
    }

    /// Record a use and drop the cached lists it makes stale
    pub async fn record(&self, event: &UsageEvent) -> Result<RecordOutcome, StoreError> {
        let outcome = self.store.record_usage(event).await?;
        self.invalidate(event.kind, &event.scope);
        if event.kind == SuggestionType::Unit {
            self.invalidate(SuggestionType::Faction, &event.scope);
        }
        Ok(outcome)
    }

    pub fn invalidate(&self, kind: SuggestionType, scope: &Scope) {
        if let Ok(key) = CacheKey::new(kind, scope) {
            self.with_cache(|cache| cache.invalidate(&key));
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.with_cache(|cache| cache.stats())
    }

    pub fn clear_cache(&self) -> usize {
        self.with_cache(|cache| cache.clear())
    }

    fn with_cache<R>(&self, f: impl FnOnce(&mut BoxedCache) -> R) -> R {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut cache)
    }
}

/// Empty terms match everything; otherwise the normalized term must appear
/// in the key, or the raw term in the display name.
fn matches_term(suggestion: &Suggestion, term: &str) -> bool {
    let raw = term.trim().to_lowercase();
    if raw.is_empty() {
        return true;
    }
    let key = normalize(&raw);
    (!key.is_empty() && suggestion.name.contains(&key))
        || suggestion.original_name.to_lowercase().contains(&raw)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
