//! Tests for normalize

use super::*;
use proptest::prelude::*;

#[test]
fn test_normalize_lowercases_and_joins_words() {
    assert_eq!(normalize("Space Marines"), "space_marines");
    assert_eq!(normalize("  Adeptus   Custodes  "), "adeptus_custodes");
}

#[test]
fn test_normalize_keeps_hyphen_and_apostrophe() {
    assert_eq!(normalize("T'au Empire"), "t'au_empire");
    assert_eq!(normalize("Leagues of Votann - Hearthkyn"), "leagues_of_votann_-_hearthkyn");
}

#[test]
fn test_normalize_strips_punctuation_and_collapses_underscores() {
    assert_eq!(normalize("Orks!!! (Goffs)"), "orks_goffs");
    assert_eq!(normalize("a @ b"), "a_b");
    assert_eq!(normalize("__necrons__"), "necrons");
}

#[test]
fn test_normalize_drops_non_ascii_letters() {
    assert_eq!(normalize("Ordo Malléus"), "ordo_mallus");
}

#[test]
fn test_normalize_empty_and_blank() {
    assert_eq!(normalize(""), "");
    assert_eq!(normalize("   "), "");
    assert_eq!(normalize("!!!"), "");
}

#[test]
fn test_normalize_truncates_to_max_len() {
    let long = "x".repeat(250);
    assert_eq!(normalize(&long).len(), MAX_KEY_LEN);
}

#[test]
fn test_normalize_truncation_does_not_leave_trailing_underscore() {
    let text = format!("{} tail", "a".repeat(MAX_KEY_LEN - 1));
    let key = normalize(&text);
    assert!(!key.ends_with('_'));
    assert_eq!(key.len(), MAX_KEY_LEN - 1);
}

#[test]
fn test_should_record_accepts_real_names() {
    assert!(should_record("Space Marines"));
    assert!(should_record("Intercessors"));
    assert!(should_record("Kill Team"));
}

#[test]
fn test_should_record_rejects_short_input() {
    assert!(!should_record(""));
    assert!(!should_record("a"));
    assert!(!should_record("  ?! "));
}

#[test]
fn test_should_record_rejects_numbers_and_tiny_words() {
    assert!(!should_record("12345"));
    assert!(!should_record("ab"));
    assert!(!should_record("Zz"));
}

#[test]
fn test_should_record_rejects_repeated_characters() {
    assert!(!should_record("heeeeello"));
    assert!(!should_record("zzzzz"));
    assert!(should_record("heeeello"));
}

#[test]
fn test_should_record_rejects_test_and_mash_prefixes() {
    assert!(!should_record("test unit"));
    assert!(!should_record("Spam spam"));
    assert!(!should_record("admin"));
    assert!(!should_record("delete me"));
    assert!(!should_record("asdfgh"));
    assert!(!should_record("qwerty"));
}

#[test]
fn test_storage_segment_for_empty_input() {
    assert_eq!(to_storage_segment(""), EMPTY_SEGMENT);
    assert_eq!(to_storage_segment("***"), EMPTY_SEGMENT);
}

#[test]
fn test_storage_segment_matches_normalized_text() {
    assert_eq!(to_storage_segment("Games Workshop"), "games_workshop");
    assert_eq!(to_storage_segment("a/b/c"), "abc");
}

#[test]
fn test_has_repeat_run() {
    assert!(has_repeat_run("aaaaa", 5));
    assert!(!has_repeat_run("aaaa", 5));
    assert!(has_repeat_run("xxaaaaayy", 5));
}

// normalize is total and idempotent for arbitrary input
proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_normalize_idempotent(text in any::<String>()) {
        let once = normalize(&text);
        let twice = normalize(&once);
        prop_assert_eq!(&once, &twice);
    }

    #[test]
    fn prop_normalize_output_alphabet(text in any::<String>()) {
        let key = normalize(&text);
        prop_assert!(key.len() <= MAX_KEY_LEN);
        prop_assert!(!key.starts_with('_'));
        prop_assert!(!key.ends_with('_'));
        prop_assert!(!key.contains("__"));
        prop_assert!(key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '\'')));
    }

    #[test]
    fn prop_storage_segment_is_safe(text in any::<String>()) {
        let segment = to_storage_segment(&text);
        prop_assert!(!segment.is_empty());
        prop_assert!(segment.len() <= MAX_SEGMENT_LEN);
        prop_assert!(!segment.contains('/'));
        prop_assert!(!(segment.starts_with("__") && segment.ends_with("__")));
    }
}
