//! Tests for suggestion

use super::*;
use chrono::TimeZone;

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
}

#[test]
fn test_suggestion_type_parse_and_display() {
    for kind in SuggestionType::ALL {
        assert_eq!(SuggestionType::parse(kind.as_str()), Some(kind));
        assert_eq!(kind.to_string(), kind.as_str());
    }
    assert_eq!(SuggestionType::parse(" Unit "), Some(SuggestionType::Unit));
    assert_eq!(SuggestionType::parse("army"), None);
}

#[test]
fn test_max_len_per_kind() {
    assert_eq!(SuggestionType::Faction.max_len(), 50);
    assert_eq!(SuggestionType::Unit.max_len(), 60);
    assert_eq!(SuggestionType::Manufacturer.max_len(), 40);
    assert_eq!(SuggestionType::Game.max_len(), 50);
}

#[test]
fn test_scope_validation_normalizes_fields() {
    let scope = Scope::new("Games Workshop", "Warhammer 40K");
    let validated = scope.validated(SuggestionType::Faction).unwrap();
    assert_eq!(validated.manufacturer, "games_workshop");
    assert_eq!(validated.game, "warhammer_40k");
    assert_eq!(validated.faction, None);
}

#[test]
fn test_scope_validation_requires_manufacturer_and_game() {
    let err = Scope::new("  ", "40k").validated(SuggestionType::Faction);
    assert_eq!(
        err,
        Err(ValidationError::MissingScope {
            field: "manufacturer"
        })
    );

    let err = Scope::new("GW", "!!").validated(SuggestionType::Game);
    assert_eq!(err, Err(ValidationError::MissingScope { field: "game" }));
}

#[test]
fn test_scope_validation_units_need_faction() {
    let scope = Scope::new("GW", "40k");
    assert_eq!(
        scope.validated(SuggestionType::Unit),
        Err(ValidationError::MissingFaction)
    );

    let scope = scope.with_faction("Space Marines");
    let validated = scope.validated(SuggestionType::Unit).unwrap();
    assert_eq!(validated.faction.as_deref(), Some("space_marines"));
}

#[test]
fn test_scope_validation_drops_faction_for_non_units() {
    let scope = Scope::new("GW", "40k").with_faction("Orks");
    let validated = scope.validated(SuggestionType::Faction).unwrap();
    assert_eq!(validated.faction, None);
}

#[test]
fn test_collection_key() {
    let scope = Scope::new("GW", "40k")
        .with_faction("Orks")
        .validated(SuggestionType::Unit)
        .unwrap();
    assert_eq!(scope.collection_key(), "gw_40k_orks");
}

#[test]
fn test_first_use_and_touch() {
    let scope = Scope::new("gw", "40k");
    let mut s = Suggestion::first_use(" Space Marines ", SuggestionKind::Faction, &scope, at(1));
    assert_eq!(s.name, "space_marines");
    assert_eq!(s.original_name, "Space Marines");
    assert_eq!(s.count, 1);
    assert_eq!(s.variants, vec!["Space Marines"]);

    s.touch("space marines", at(2));
    s.touch("Space Marines", at(3));
    assert_eq!(s.count, 3);
    assert_eq!(s.variants, vec!["Space Marines", "space marines"]);
    assert_eq!(s.last_used, Some(at(3)));
    assert_eq!(s.original_name, "Space Marines");
}

#[test]
fn test_most_recent_activity() {
    let scope = Scope::new("gw", "40k");
    let mut s = Suggestion::first_use("Orks", SuggestionKind::Faction, &scope, at(5));
    s.last_used = Some(at(9));
    assert_eq!(s.most_recent_activity(), Some(at(9)));

    s.last_used = None;
    assert_eq!(s.most_recent_activity(), Some(at(5)));

    s.first_seen = None;
    assert_eq!(s.most_recent_activity(), None);
}

#[test]
fn test_serde_layout_uses_camel_case_and_type_tag() {
    let scope = Scope::new("gw", "40k");
    let unit = Suggestion::first_use(
        "Intercessors",
        SuggestionKind::Unit {
            parent_faction: "space_marines".to_string(),
        },
        &scope,
        at(1),
    );
    let value = serde_json::to_value(&unit).unwrap();
    assert_eq!(value["type"], "unit");
    assert_eq!(value["parentFaction"], "space_marines");
    assert_eq!(value["originalName"], "Intercessors");
    assert_eq!(value["isBlocked"], false);

    let back: Suggestion = serde_json::from_value(value).unwrap();
    assert_eq!(back, unit);
}

#[test]
fn test_deserialize_legacy_document_without_dates() {
    let json = r#"{
        "name": "orks",
        "originalName": "Orks",
        "count": 4,
        "type": "faction",
        "manufacturer": "gw",
        "game": "40k"
    }"#;
    let s: Suggestion = serde_json::from_str(json).unwrap();
    assert_eq!(s.kind, SuggestionKind::Faction);
    assert!(s.first_seen.is_none());
    assert!(s.variants.is_empty());
    assert!(!s.is_promoted);
}
