use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, ValidationError};
use crate::suggestion::{Scope, Suggestion, SuggestionType};

/// Schema tag stored with every entry; bump when `Suggestion` changes shape
pub const CACHE_VERSION: &str = "3";

pub const KEY_PREFIX: &str = "suggestions_cache_";

/// Cache slot for one `(manufacturer, game[, faction], type)` context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: SuggestionType,
    scope: Scope,
}

impl CacheKey {
    pub fn new(kind: SuggestionType, scope: &Scope) -> Result<Self, ValidationError> {
        Ok(Self {
            kind,
            scope: scope.validated(kind)?,
        })
    }

    pub fn kind(&self) -> SuggestionType {
        self.kind
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Type encoded in the trailing segment of a stored key
    pub fn kind_of(storage_key: &str) -> Option<SuggestionType> {
        if !storage_key.starts_with(KEY_PREFIX) {
            return None;
        }
        storage_key
            .rsplit_once('_')
            .and_then(|(_, kind)| SuggestionType::parse(kind))
    }

    pub fn is_cache_key(storage_key: &str) -> bool {
        Self::kind_of(storage_key).is_some()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}_{}", KEY_PREFIX, self.scope.collection_key(), self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub data: Vec<Suggestion>,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub version: String,
    #[serde(default)]
    pub hit_count: u64,
    /// Normalized scope the entry was fetched for
    pub scope: Scope,
    /// Documents the scope held when fetched; `data` may be a capped prefix
    #[serde(default)]
    pub corpus_size: usize,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Parse a stored payload, rejecting corrupt JSON and foreign versions
    pub fn decode(raw: &str) -> Result<Self, CacheError> {
        let entry: CacheEntry =
            serde_json::from_str(raw).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        if entry.version != CACHE_VERSION {
            return Err(CacheError::VersionMismatch {
                found: entry.version,
                expected: CACHE_VERSION.to_string(),
            });
        }
        Ok(entry)
    }

    pub fn encode(&self) -> Result<String, CacheError> {
        serde_json::to_string(self).map_err(|e| CacheError::Corrupt(e.to_string()))
    }
}
