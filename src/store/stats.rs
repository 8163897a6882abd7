use std::collections::BTreeMap;

use futures::future::try_join_all;

use super::RemoteSuggestionStore;
use super::backend::CollectionPath;
use crate::error::StoreError;
use crate::suggestion::{Scope, Suggestion, SuggestionType};

/// Names listed in [`ScopeStats::top`]
const TOP_LIMIT: usize = 10;

/// Aggregate counts for one `(manufacturer, game)` scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeStats {
    pub total: usize,
    pub by_type: BTreeMap<SuggestionType, usize>,
    pub promoted: usize,
    pub blocked: usize,
    /// Suggestions with at least one report
    pub reported: usize,
    /// Sum of every suggestion's count
    pub total_usage: u64,
    /// Most used `(name, count)` pairs across all kinds
    pub top: Vec<(String, u64)>,
}

impl ScopeStats {
    fn from_docs(docs: &[Suggestion]) -> Self {
        let mut stats = ScopeStats {
            total: docs.len(),
            ..Self::default()
        };
        for doc in docs {
            *stats.by_type.entry(doc.suggestion_type()).or_insert(0) += 1;
            stats.promoted += usize::from(doc.is_promoted);
            stats.blocked += usize::from(doc.is_blocked);
            stats.reported += usize::from(doc.report_count > 0);
            stats.total_usage += doc.count;
        }

        let mut ranked: Vec<&Suggestion> = docs.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        stats.top = ranked
            .into_iter()
            .take(TOP_LIMIT)
            .map(|doc| (doc.name.clone(), doc.count))
            .collect();
        stats
    }
}

impl RemoteSuggestionStore {
    /// Aggregate stats over every kind in a scope, units of every faction included.
    pub async fn get_stats(&self, manufacturer: &str, game: &str) -> Result<ScopeStats, StoreError> {
        let scope = Scope::new(manufacturer, game).validated(SuggestionType::Faction)?;

        let mut docs = Vec::new();
        for kind in [
            SuggestionType::Faction,
            SuggestionType::Manufacturer,
            SuggestionType::Game,
        ] {
            let collection = CollectionPath::new(kind, &scope);
            docs.extend(
                self.timed(self.backend.list(&collection))
                    .await?
                    .into_iter()
                    .map(|snapshot| snapshot.doc)
                    .filter(|doc| doc.in_scope(&scope)),
            );
        }

        let unit_scopes: Vec<Scope> = docs
            .iter()
            .filter(|doc| doc.suggestion_type() == SuggestionType::Faction)
            .map(|faction| Scope {
                faction: Some(faction.name.clone()),
                ..scope.clone()
            })
            .collect();
        let unit_collections: Vec<CollectionPath> = unit_scopes
            .iter()
            .map(|unit_scope| CollectionPath::new(SuggestionType::Unit, unit_scope))
            .collect();

        let unit_lists = try_join_all(
            unit_collections
                .iter()
                .map(|collection| self.timed(self.backend.list(collection))),
        )
        .await?;
        for (unit_scope, list) in unit_scopes.iter().zip(unit_lists) {
            docs.extend(
                list.into_iter()
                    .map(|snapshot| snapshot.doc)
                    .filter(|doc| doc.in_scope(unit_scope)),
            );
        }

        Ok(ScopeStats::from_docs(&docs))
    }
}
