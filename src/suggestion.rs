//! Suggestion data model
//!
//! A suggestion is a shared base record plus a [`SuggestionKind`] tag. Units
//! are the only kind that carries extra data (their parent faction), so the
//! tag is an enum rather than a bag of optional fields.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::normalize::{normalize, to_storage_segment};

/// Kind of suggestion without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Faction,
    Unit,
    Manufacturer,
    Game,
}

impl SuggestionType {
    pub const ALL: [SuggestionType; 4] = [
        SuggestionType::Faction,
        SuggestionType::Unit,
        SuggestionType::Manufacturer,
        SuggestionType::Game,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::Faction => "faction",
            SuggestionType::Unit => "unit",
            SuggestionType::Manufacturer => "manufacturer",
            SuggestionType::Game => "game",
        }
    }

    /// Longest normalized name accepted for this kind
    pub fn max_len(&self) -> usize {
        match self {
            SuggestionType::Faction => 50,
            SuggestionType::Unit => 60,
            SuggestionType::Manufacturer => 40,
            SuggestionType::Game => 50,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "faction" => Some(SuggestionType::Faction),
            "unit" => Some(SuggestionType::Unit),
            "manufacturer" => Some(SuggestionType::Manufacturer),
            "game" => Some(SuggestionType::Game),
            _ => None,
        }
    }

    /// Collection name prefix in the document store
    pub(crate) fn collection(&self) -> &'static str {
        match self {
            SuggestionType::Faction => "factions",
            SuggestionType::Unit => "units",
            SuggestionType::Manufacturer => "manufacturers",
            SuggestionType::Game => "games",
        }
    }
}

impl fmt::Display for SuggestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind tag with per-kind payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SuggestionKind {
    Faction,
    Unit {
        #[serde(rename = "parentFaction")]
        parent_faction: String,
    },
    Manufacturer,
    Game,
}

impl SuggestionKind {
    pub fn suggestion_type(&self) -> SuggestionType {
        match self {
            SuggestionKind::Faction => SuggestionType::Faction,
            SuggestionKind::Unit { .. } => SuggestionType::Unit,
            SuggestionKind::Manufacturer => SuggestionType::Manufacturer,
            SuggestionKind::Game => SuggestionType::Game,
        }
    }

    pub fn parent_faction(&self) -> Option<&str> {
        match self {
            SuggestionKind::Unit { parent_faction } => Some(parent_faction),
            _ => None,
        }
    }
}

/// The `(manufacturer, game[, faction])` tuple partitioning the namespace.
///
/// Fields hold raw user text; [`Scope::validated`] normalizes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub manufacturer: String,
    pub game: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction: Option<String>,
}

impl Scope {
    pub fn new(manufacturer: impl Into<String>, game: impl Into<String>) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            game: game.into(),
            faction: None,
        }
    }

    pub fn with_faction(mut self, faction: impl Into<String>) -> Self {
        self.faction = Some(faction.into());
        self
    }

    /// Normalize every field and check the ones `kind` needs are present.
    pub fn validated(&self, kind: SuggestionType) -> Result<Scope, ValidationError> {
        let manufacturer = normalize(&self.manufacturer);
        if manufacturer.is_empty() {
            return Err(ValidationError::MissingScope {
                field: "manufacturer",
            });
        }
        let game = normalize(&self.game);
        if game.is_empty() {
            return Err(ValidationError::MissingScope { field: "game" });
        }

        let faction = self
            .faction
            .as_deref()
            .map(normalize)
            .filter(|f| !f.is_empty());
        if kind == SuggestionType::Unit && faction.is_none() {
            return Err(ValidationError::MissingFaction);
        }

        Ok(Scope {
            manufacturer,
            game,
            // Only units are partitioned by faction
            faction: if kind == SuggestionType::Unit {
                faction
            } else {
                None
            },
        })
    }

    /// Store collection key: `{manufacturer}_{game}[_{faction}]`
    pub fn collection_key(&self) -> String {
        let mut key = format!(
            "{}_{}",
            to_storage_segment(&self.manufacturer),
            to_storage_segment(&self.game)
        );
        if let Some(faction) = &self.faction {
            key.push('_');
            key.push_str(&to_storage_segment(faction));
        }
        key
    }
}

/// A persisted, usage-ranked suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Normalized key, unique within its scope
    pub name: String,
    /// First-seen display casing
    pub original_name: String,
    /// Every distinct original spelling ever submitted
    #[serde(default)]
    pub variants: Vec<String>,
    pub count: u64,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_promoted: bool,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    #[serde(default)]
    pub report_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub kind: SuggestionKind,
    pub manufacturer: String,
    pub game: String,
    /// Units created under this faction
    #[serde(default, skip_serializing_if = "is_zero")]
    pub unit_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl Suggestion {
    /// Fresh suggestion with `count = 1`, as created on first recorded use.
    pub fn first_use(
        original: &str,
        kind: SuggestionKind,
        scope: &Scope,
        now: DateTime<Utc>,
    ) -> Self {
        let original = original.trim().to_string();
        Self {
            name: normalize(&original),
            variants: vec![original.clone()],
            original_name: original,
            count: 1,
            first_seen: Some(now),
            last_used: Some(now),
            is_promoted: false,
            is_blocked: false,
            block_reason: None,
            report_count: 0,
            moderated_at: None,
            kind,
            manufacturer: scope.manufacturer.clone(),
            game: scope.game.clone(),
            unit_count: 0,
            created_by: None,
        }
    }

    pub fn suggestion_type(&self) -> SuggestionType {
        self.kind.suggestion_type()
    }

    /// Count one more use, remembering a new spelling if there is one.
    pub fn touch(&mut self, original: &str, now: DateTime<Utc>) {
        self.count += 1;
        self.last_used = Some(now);
        let original = original.trim();
        if !original.is_empty() && !self.variants.iter().any(|v| v == original) {
            self.variants.push(original.to_string());
        }
    }

    /// Whether this document was recorded under `scope`.
    ///
    /// `scope` must already be [`Scope::validated`]. Distinct scopes can
    /// share a collection key, so a document found under a key is only
    /// trusted once its own scope fields agree.
    pub fn in_scope(&self, scope: &Scope) -> bool {
        self.manufacturer == scope.manufacturer
            && self.game == scope.game
            && self.kind.parent_faction() == scope.faction.as_deref()
    }

    /// Latest of `last_used` and `first_seen`
    pub fn most_recent_activity(&self) -> Option<DateTime<Utc>> {
        match (self.last_used, self.first_seen) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
#[path = "suggestion_tests.rs"]
mod suggestion_tests;
