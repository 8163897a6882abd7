//! Tests for quality

use super::*;
use crate::test_utils::test_helpers::suggestion;
use proptest::prelude::*;

fn aged(name: &str, count: u64, days_ago: i64, now: DateTime<Utc>) -> Suggestion {
    let mut s = suggestion(name, count);
    s.first_seen = Some(now - Duration::days(days_ago));
    s.last_used = Some(now - Duration::days(days_ago));
    s
}

#[test]
fn test_threshold_scales_with_corpus() {
    assert_eq!(threshold(0), 1);
    assert_eq!(threshold(9), 1);
    assert_eq!(threshold(10), 2);
    assert_eq!(threshold(49), 2);
    assert_eq!(threshold(50), 3);
    assert_eq!(threshold(199), 3);
    assert_eq!(threshold(200), 5);
    assert_eq!(threshold(499), 5);
    assert_eq!(threshold(500), 8);
    assert_eq!(threshold(10_000), 8);
}

#[test]
fn test_should_show_threshold_scaling() {
    let mut s = suggestion("Orks", 5);
    assert!(should_show(&s, 8));
    assert!(!should_show(&s, 600));

    s.is_promoted = true;
    assert!(should_show(&s, 600));
}

#[test]
fn test_blocked_beats_promoted() {
    let mut s = suggestion("Orks", 500);
    s.is_promoted = true;
    s.is_blocked = true;
    assert!(!should_show(&s, 1));
}

#[test]
fn test_quality_score_components() {
    let now = Utc::now();
    let mut s = aged("Orks", 10, 1, now);
    // usage 20 + recency 10
    assert_eq!(quality_score_at(&s, now), 30);

    s.variants = vec!["Orks".into(), "orks".into(), "ORKS".into()];
    assert_eq!(quality_score_at(&s, now), 32);

    s.is_promoted = true;
    assert_eq!(quality_score_at(&s, now), 52);

    s.report_count = 2;
    assert_eq!(quality_score_at(&s, now), 42);

    s.last_used = Some(now - Duration::days(10));
    assert_eq!(quality_score_at(&s, now), 37);

    s.last_used = Some(now - Duration::days(90));
    assert_eq!(quality_score_at(&s, now), 32);
}

#[test]
fn test_quality_score_is_clamped() {
    let now = Utc::now();
    let mut s = aged("Orks", 1_000, 0, now);
    s.is_promoted = true;
    s.variants = (0..30).map(|i| format!("orks{}", i)).collect();
    assert_eq!(quality_score_at(&s, now), 100);

    let mut low = aged("Orks", 1, 400, now);
    low.report_count = 50;
    assert_eq!(quality_score_at(&low, now), 0);
}

#[test]
fn test_apply_filters_dynamic_threshold_uses_total_override() {
    let now = Utc::now();
    let items = vec![aged("Orks", 3, 1, now), aged("Necrons", 9, 1, now)];
    let options = FilterOptions {
        total_candidates: Some(600),
        ..FilterOptions::default()
    };
    let out = apply_filters_at(&items, &options, now);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "necrons");

    let out = apply_filters_at(&items, &FilterOptions::default(), now);
    assert_eq!(out.len(), 2);
}

#[test]
fn test_apply_filters_content_filter_uses_original_name() {
    let now = Utc::now();
    let items = vec![aged("Test Army", 9, 1, now), aged("Orks", 9, 1, now)];
    let out = apply_filters_at(&items, &FilterOptions::default(), now);
    assert_eq!(out.len(), 1);

    let admin = FilterContext::Admin.options();
    assert_eq!(apply_filters_at(&items, &admin, now).len(), 2);
}

#[test]
fn test_apply_filters_recency_window() {
    let now = Utc::now();
    let mut undated = suggestion("Tyranids", 3);
    undated.first_seen = None;
    undated.last_used = None;

    let mut revived = aged("Necrons", 3, 800, now);
    revived.last_used = Some(now - Duration::days(2));

    let items = vec![aged("Orks", 3, 400, now), undated, revived];
    let out = apply_filters_at(&items, &FilterOptions::default(), now);
    let names: Vec<_> = out.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["tyranids", "necrons"]);
}

#[test]
fn test_apply_filters_quality_floor_and_truncation() {
    let now = Utc::now();
    let items: Vec<_> = (0..30)
        .map(|i| aged(&format!("Faction {}", i), (i % 4) + 1, 60, now))
        .collect();

    let options = FilterOptions {
        threshold: ThresholdPolicy::Off,
        min_quality: Some(6),
        max_results: Some(5),
        ..FilterOptions::default()
    };
    let out = apply_filters_at(&items, &options, now);
    assert_eq!(out.len(), 5);
    assert!(out.iter().all(|s| s.count >= 3));
}

#[test]
fn test_presets() {
    let auto = FilterContext::Autocomplete.options();
    assert_eq!(auto.threshold, ThresholdPolicy::Fixed(5));
    assert_eq!(auto.max_age_days, Some(365));
    assert_eq!(auto.max_results, Some(10));
    assert!(auto.filter_inappropriate);

    let public = FilterContext::Public.options();
    assert_eq!(public.threshold, ThresholdPolicy::Fixed(10));
    assert_eq!(public.min_quality, Some(10));
    assert_eq!(public.max_age_days, Some(180));
    assert_eq!(public.max_results, Some(20));

    let admin = FilterContext::Admin.options();
    assert_eq!(admin.threshold, ThresholdPolicy::Off);
    assert!(!admin.filter_inappropriate);
    assert_eq!(admin.max_age_days, Some(365));
    assert_eq!(admin.max_results, Some(100));

    assert_eq!(FilterContext::parse("Public"), Some(FilterContext::Public));
    assert_eq!(FilterContext::parse("private"), None);
}

#[test]
fn test_admin_preset_drops_entries_idle_for_over_a_year() {
    let now = Utc::now();
    let recent = aged("Orks", 1, 364, now);
    let stale = aged("Squats", 1, 400, now);
    let out = apply_filters_at(&[recent, stale], &FilterContext::Admin.options(), now);
    let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["orks"]);
}

#[test]
fn test_admin_preset_still_drops_blocked() {
    let now = Utc::now();
    let mut blocked = aged("Orks", 1, 1, now);
    blocked.is_blocked = true;
    let out = apply_filters_at(&[blocked], &FilterContext::Admin.options(), now);
    assert!(out.is_empty());
}

fn arb_suggestion() -> impl Strategy<Value = Suggestion> {
    (
        "[A-Za-z]{3,12}",
        1u64..40,
        any::<bool>(),
        any::<bool>(),
        0u32..6,
        0i64..500,
    )
        .prop_map(|(name, count, promoted, blocked, reports, days)| {
            let now = Utc::now();
            let mut s = aged(&name, count, days, now);
            s.is_promoted = promoted;
            s.is_blocked = blocked;
            s.report_count = reports;
            s
        })
}

fn arb_options() -> impl Strategy<Value = FilterOptions> {
    (
        prop_oneof![
            Just(ThresholdPolicy::Off),
            Just(ThresholdPolicy::Dynamic),
            (1u64..20).prop_map(ThresholdPolicy::Fixed),
        ],
        proptest::option::of(0u8..60),
        any::<bool>(),
        proptest::option::of(1i64..400),
        proptest::option::of(0usize..30),
    )
        .prop_map(
            |(threshold, min_quality, filter_inappropriate, max_age_days, max_results)| {
                FilterOptions {
                    threshold,
                    min_quality,
                    filter_inappropriate,
                    max_age_days,
                    max_results,
                    total_candidates: None,
                }
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // shouldShow holds exactly when not blocked and promoted or over threshold
    #[test]
    fn prop_should_show_law(s in arb_suggestion(), total in 0usize..1000) {
        let expected = !s.is_blocked && (s.is_promoted || s.count >= threshold(total));
        prop_assert_eq!(should_show(&s, total), expected);
    }

    // applyFilters returns an ordered subset, bounded by maxResults, never blocked
    #[test]
    fn prop_apply_filters_subset(
        items in proptest::collection::vec(arb_suggestion(), 0..40),
        options in arb_options(),
    ) {
        let out = apply_filters(&items, &options);

        if let Some(max) = options.max_results {
            prop_assert!(out.len() <= max);
        }
        prop_assert!(out.iter().all(|s| !s.is_blocked));

        let mut cursor = items.iter();
        for kept in &out {
            prop_assert!(cursor.any(|s| s == kept), "output must be an ordered subset of input");
        }
    }

    #[test]
    fn prop_quality_score_in_range(s in arb_suggestion()) {
        prop_assert!(quality_score(&s) <= 100);
    }
}
