//! Remote suggestion store
//!
//! Hierarchical, usage-ranked suggestion documents keyed by scope. The
//! primary write path is [`RemoteSuggestionStore::record_usage`], an
//! optimistic read-increment-write transaction that also creates or bumps the
//! parent faction when a unit is recorded.

mod admin;
pub mod backend;
mod file;
mod memory;
mod stats;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub use admin::AdminUpdate;
pub use backend::{CollectionPath, DocPath, DocumentBackend, Precondition, Snapshot, WriteBatch};
pub use file::{FileBackend, default_data_path};
pub use memory::MemoryBackend;
pub use stats::ScopeStats;

use crate::error::{StoreError, ValidationError};
use crate::normalize::{normalize, should_record};
use crate::suggestion::{Scope, Suggestion, SuggestionKind, SuggestionType};

pub const DEFAULT_QUERY_LIMIT: usize = 100;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_TRANSACTION_ATTEMPTS: u32 = 25;

/// Longest pause between conflicting transaction attempts
const MAX_BACKOFF_MS: u64 = 50;

/// Opaque context attached to a recorded use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageMetadata {
    /// Authenticated actor, if any
    pub actor: Option<String>,
    /// Where the use came from (e.g. "autocomplete", "manual")
    pub source: Option<String>,
}

/// One use of a name in a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent {
    pub kind: SuggestionType,
    pub scope: Scope,
    pub value: String,
    pub metadata: UsageMetadata,
}

impl UsageEvent {
    pub fn new(kind: SuggestionType, scope: Scope, value: impl Into<String>) -> Self {
        Self {
            kind,
            scope,
            value: value.into(),
            metadata: UsageMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: UsageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub suggestion: Suggestion,
    /// The suggestion did not exist before this use
    pub created: bool,
    /// The parent faction was created alongside a unit
    pub parent_created: bool,
    /// Transaction attempts it took to land
    pub attempts: u32,
}

/// Address of a single suggestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRef {
    pub kind: SuggestionType,
    pub scope: Scope,
    pub name: String,
}

impl SuggestionRef {
    pub fn new(kind: SuggestionType, scope: Scope, name: impl Into<String>) -> Self {
        Self {
            kind,
            scope,
            name: name.into(),
        }
    }

    pub fn doc_path(&self) -> Result<DocPath, ValidationError> {
        self.resolve().map(|(path, _)| path)
    }

    /// Document path plus the normalized scope a document there must carry
    pub(crate) fn resolve(&self) -> Result<(DocPath, Scope), ValidationError> {
        let scope = self.scope.validated(self.kind)?;
        let name = normalize(&self.name);
        if name.is_empty() {
            return Err(ValidationError::TooShort);
        }
        Ok((DocPath::new(self.kind, &scope, &name), scope))
    }
}

/// Candidates of one kind within a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeQuery {
    pub kind: SuggestionType,
    pub scope: Scope,
    /// Prefix of the normalized name; `None` lists the whole scope
    pub search_term: Option<String>,
    pub limit: usize,
}

impl ScopeQuery {
    pub fn new(kind: SuggestionType, scope: Scope) -> Self {
        Self {
            kind,
            scope,
            search_term: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }

    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Upper bound on any single backend call
    pub request_timeout: Duration,
    /// Conflicting attempts tolerated before a transaction gives up
    pub max_transaction_attempts: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            max_transaction_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
        }
    }
}

/// One scope's candidates plus how many the scope holds in total
#[derive(Debug, Clone, PartialEq)]
pub struct ScopePage {
    pub suggestions: Vec<Suggestion>,
    /// Matching documents before the limit was applied
    pub total: usize,
}

/// Validated form of a [`UsageEvent`]
struct ValidUsage {
    scope: Scope,
    name: String,
    kind: SuggestionKind,
    /// Parent faction path and display text, units only
    parent: Option<(DocPath, String)>,
}

pub struct RemoteSuggestionStore {
    backend: Arc<dyn DocumentBackend>,
    options: StoreOptions,
}

impl RemoteSuggestionStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self::with_options(backend, StoreOptions::default())
    }

    pub fn with_options(backend: Arc<dyn DocumentBackend>, options: StoreOptions) -> Self {
        Self { backend, options }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Check an event against the content filter, length bounds and scope.
    pub fn validate_usage(event: &UsageEvent) -> Result<(), ValidationError> {
        Self::validate(event).map(|_| ())
    }

    fn validate(event: &UsageEvent) -> Result<ValidUsage, ValidationError> {
        let name = check_text(&event.value, event.kind)?;
        let scope = event.scope.validated(event.kind)?;

        let (kind, parent) = match event.kind {
            SuggestionType::Faction => (SuggestionKind::Faction, None),
            SuggestionType::Manufacturer => (SuggestionKind::Manufacturer, None),
            SuggestionType::Game => (SuggestionKind::Game, None),
            SuggestionType::Unit => {
                let faction_text = event.scope.faction.as_deref().unwrap_or_default();
                let faction = check_text(faction_text, SuggestionType::Faction)?;
                let parent_path =
                    DocPath::new(SuggestionType::Faction, &parent_scope(&scope), &faction);
                (
                    SuggestionKind::Unit {
                        parent_faction: faction,
                    },
                    Some((parent_path, faction_text.trim().to_string())),
                )
            }
        };

        Ok(ValidUsage {
            scope,
            name,
            kind,
            parent,
        })
    }

    /// Record one use of a name, creating it on first use.
    ///
    /// Runs as a single transaction: the suggestion's increment and, for
    /// units, the parent faction's creation or unit counter bump either all
    /// land or none do. Conflicts with concurrent writers are retried.
    pub async fn record_usage(&self, event: &UsageEvent) -> Result<RecordOutcome, StoreError> {
        let usage = Self::validate(event)?;
        let path = DocPath::new(event.kind, &usage.scope, &usage.name);
        let max_attempts = self.options.max_transaction_attempts.max(1);

        for attempt in 1..=max_attempts {
            let now = Utc::now();
            match self.try_record(event, &usage, &path, now).await {
                Ok(mut outcome) => {
                    outcome.attempts = attempt;
                    log::debug!(
                        "Recorded use of {} (count {}, attempt {})",
                        path,
                        outcome.suggestion.count,
                        attempt
                    );
                    return Ok(outcome);
                }
                Err(StoreError::Conflict) => {
                    log::debug!("Conflict recording {} on attempt {}", path, attempt);
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }

        log::warn!(
            "Giving up recording {} after {} conflicting attempts",
            path,
            max_attempts
        );
        Err(StoreError::TooManyConflicts {
            attempts: max_attempts,
        })
    }

    async fn try_record(
        &self,
        event: &UsageEvent,
        usage: &ValidUsage,
        path: &DocPath,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, StoreError> {
        let mut batch = WriteBatch::new();

        let (suggestion, created) = match self.timed(self.backend.get(path)).await? {
            Some(snapshot) if !snapshot.doc.in_scope(&usage.scope) => {
                return Err(scope_collision(path).into());
            }
            Some(snapshot) => {
                let mut doc = snapshot.doc;
                doc.touch(&event.value, now);
                batch.put(
                    path.clone(),
                    doc.clone(),
                    Precondition::Revision(snapshot.revision),
                );
                (doc, false)
            }
            None => {
                let mut doc =
                    Suggestion::first_use(&event.value, usage.kind.clone(), &usage.scope, now);
                doc.created_by = event.metadata.actor.clone();
                batch.put(path.clone(), doc.clone(), Precondition::Missing);
                (doc, true)
            }
        };

        let mut parent_created = false;
        if let Some((parent_path, faction_text)) = &usage.parent {
            match self.timed(self.backend.get(parent_path)).await? {
                None => {
                    let mut faction = Suggestion::first_use(
                        faction_text,
                        SuggestionKind::Faction,
                        &parent_scope(&usage.scope),
                        now,
                    );
                    faction.created_by = event.metadata.actor.clone();
                    if created {
                        faction.unit_count = 1;
                    }
                    batch.put(parent_path.clone(), faction, Precondition::Missing);
                    parent_created = true;
                }
                Some(snapshot) if !snapshot.doc.in_scope(&parent_scope(&usage.scope)) => {
                    return Err(scope_collision(parent_path).into());
                }
                Some(snapshot) if created => {
                    let mut faction = snapshot.doc;
                    faction.unit_count += 1;
                    faction.last_used = Some(now);
                    batch.put(
                        parent_path.clone(),
                        faction,
                        Precondition::Revision(snapshot.revision),
                    );
                }
                Some(_) => {}
            }
        }

        self.timed(self.backend.commit(batch)).await?;

        Ok(RecordOutcome {
            suggestion,
            created,
            parent_created,
            attempts: 0,
        })
    }

    /// Create a suggestion with `count = 1`; fails with
    /// [`StoreError::Conflict`] when it already exists.
    pub async fn create(&self, event: &UsageEvent) -> Result<Suggestion, StoreError> {
        let usage = Self::validate(event)?;
        let path = DocPath::new(event.kind, &usage.scope, &usage.name);

        let mut doc = Suggestion::first_use(&event.value, usage.kind, &usage.scope, Utc::now());
        doc.created_by = event.metadata.actor.clone();

        let mut batch = WriteBatch::new();
        batch.put(path, doc.clone(), Precondition::Missing);
        self.timed(self.backend.commit(batch)).await?;
        Ok(doc)
    }

    pub async fn get(&self, target: &SuggestionRef) -> Result<Option<Suggestion>, StoreError> {
        let (path, scope) = target.resolve()?;
        Ok(self
            .timed(self.backend.get(&path))
            .await?
            .map(|snapshot| snapshot.doc)
            .filter(|doc| doc.in_scope(&scope)))
    }

    /// Unfiltered candidates in a scope, most used first.
    ///
    /// Quality filtering and relevance ranking are the caller's job.
    pub async fn query_by_scope(&self, query: &ScopeQuery) -> Result<Vec<Suggestion>, StoreError> {
        self.query_page(query).await.map(|page| page.suggestions)
    }

    /// [`Self::query_by_scope`] plus the size of the whole matching set
    pub async fn query_page(&self, query: &ScopeQuery) -> Result<ScopePage, StoreError> {
        let scope = query.scope.validated(query.kind)?;
        let collection = CollectionPath::new(query.kind, &scope);
        let prefix = query
            .search_term
            .as_deref()
            .map(normalize)
            .unwrap_or_default();

        let mut docs: Vec<Suggestion> = self
            .timed(self.backend.list(&collection))
            .await?
            .into_iter()
            .map(|snapshot| snapshot.doc)
            .filter(|doc| doc.in_scope(&scope) && doc.name.starts_with(&prefix))
            .collect();

        let total = docs.len();
        docs.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        docs.truncate(query.limit);
        Ok(ScopePage {
            suggestions: docs,
            total,
        })
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.options.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                after_ms: self.options.request_timeout.as_millis() as u64,
            }),
        }
    }
}

/// Scope of the faction a unit in `scope` belongs to
fn parent_scope(scope: &Scope) -> Scope {
    Scope {
        faction: None,
        ..scope.clone()
    }
}

fn scope_collision(path: &DocPath) -> ValidationError {
    log::warn!("{} belongs to a different scope", path);
    ValidationError::ScopeCollision {
        path: path.to_string(),
    }
}

/// Normalize and bound-check text for `kind`
fn check_text(text: &str, kind: SuggestionType) -> Result<String, ValidationError> {
    let name = normalize(text);
    if name.chars().count() < crate::normalize::MIN_RECORD_LEN {
        return Err(ValidationError::TooShort);
    }
    if name.len() > kind.max_len() {
        return Err(ValidationError::TooLong {
            kind,
            max: kind.max_len(),
            len: name.len(),
        });
    }
    if !should_record(text) {
        return Err(ValidationError::Rejected);
    }
    Ok(name)
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis((1u64 << attempt.min(6)).min(MAX_BACKOFF_MS))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
