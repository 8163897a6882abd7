//! Quality control for suggestion lists
//!
//! Decides what is worth showing: a usage threshold that scales with corpus
//! size, a composite quality score, the content filter and a recency window.
//! Blocked suggestions are vetoed everywhere; promoted ones skip the
//! threshold.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::normalize::should_record;
use crate::suggestion::Suggestion;

pub const DEFAULT_MAX_AGE_DAYS: i64 = 365;

/// Minimum count before a suggestion is shown, by corpus size
pub fn threshold(total_candidates: usize) -> u64 {
    match total_candidates {
        0..10 => 1,
        10..50 => 2,
        50..200 => 3,
        200..500 => 5,
        _ => 8,
    }
}

pub fn should_show(suggestion: &Suggestion, total_candidates: usize) -> bool {
    if suggestion.is_blocked {
        return false;
    }
    suggestion.is_promoted || suggestion.count >= threshold(total_candidates)
}

/// Composite 0-100 score blending usage, promotion, reports, recency and spelling variety
pub fn quality_score(suggestion: &Suggestion) -> u8 {
    quality_score_at(suggestion, Utc::now())
}

pub fn quality_score_at(suggestion: &Suggestion, now: DateTime<Utc>) -> u8 {
    let usage = suggestion.count.saturating_mul(2).min(60) as i64;
    let promotion = if suggestion.is_promoted { 20 } else { 0 };
    let reports = (i64::from(suggestion.report_count) * 5).min(20);

    let recency = match suggestion.last_used {
        Some(last) if now - last < Duration::days(7) => 10,
        Some(last) if now - last < Duration::days(30) => 5,
        _ => 0,
    };
    let variety = (suggestion.variants.len().saturating_sub(1) as i64).min(10);

    (usage + promotion - reports + recency + variety).clamp(0, 100) as u8
}

/// Where a list is shown, each with a fixed filter preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterContext {
    #[default]
    Autocomplete,
    Public,
    Admin,
}

impl FilterContext {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "autocomplete" => Some(FilterContext::Autocomplete),
            "public" => Some(FilterContext::Public),
            "admin" => Some(FilterContext::Admin),
            _ => None,
        }
    }

    pub fn options(&self) -> FilterOptions {
        match self {
            FilterContext::Autocomplete => FilterOptions {
                threshold: ThresholdPolicy::Fixed(5),
                max_age_days: Some(365),
                max_results: Some(10),
                ..FilterOptions::default()
            },
            FilterContext::Public => FilterOptions {
                threshold: ThresholdPolicy::Fixed(10),
                min_quality: Some(10),
                max_age_days: Some(180),
                max_results: Some(20),
                ..FilterOptions::default()
            },
            FilterContext::Admin => FilterOptions {
                threshold: ThresholdPolicy::Off,
                filter_inappropriate: false,
                max_results: Some(100),
                ..FilterOptions::default()
            },
        }
    }
}

/// How the usage threshold is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdPolicy {
    Off,
    /// Scale with corpus size via [`threshold`]
    Dynamic,
    /// Fixed minimum count
    Fixed(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    pub threshold: ThresholdPolicy,
    pub min_quality: Option<u8>,
    pub filter_inappropriate: bool,
    /// Drop entries idle for longer than this; `None` keeps everything
    pub max_age_days: Option<i64>,
    pub max_results: Option<usize>,
    /// Corpus size for the dynamic threshold; defaults to the input length
    pub total_candidates: Option<usize>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            threshold: ThresholdPolicy::Dynamic,
            min_quality: None,
            filter_inappropriate: true,
            max_age_days: Some(DEFAULT_MAX_AGE_DAYS),
            max_results: None,
            total_candidates: None,
        }
    }
}

pub fn apply_filters(suggestions: &[Suggestion], options: &FilterOptions) -> Vec<Suggestion> {
    apply_filters_at(suggestions, options, Utc::now())
}

/// Threshold, quality floor, content filter, recency window, then truncation.
///
/// Output is always a subset of the input, in input order, with no blocked
/// entries.
pub fn apply_filters_at(
    suggestions: &[Suggestion],
    options: &FilterOptions,
    now: DateTime<Utc>,
) -> Vec<Suggestion> {
    let total = options.total_candidates.unwrap_or(suggestions.len());

    let passes_threshold = |s: &Suggestion| match options.threshold {
        ThresholdPolicy::Off => !s.is_blocked,
        ThresholdPolicy::Dynamic => should_show(s, total),
        ThresholdPolicy::Fixed(min) => !s.is_blocked && (s.is_promoted || s.count >= min),
    };
    let passes_quality = |s: &Suggestion| {
        options
            .min_quality
            .is_none_or(|min| quality_score_at(s, now) >= min)
    };
    let passes_content = |s: &Suggestion| !options.filter_inappropriate || should_record(&s.original_name);
    let passes_recency = |s: &Suggestion| match (options.max_age_days, s.most_recent_activity()) {
        (Some(days), Some(latest)) => now - latest <= Duration::days(days),
        _ => true,
    };

    let filtered = suggestions
        .iter()
        .filter(|s| passes_threshold(s))
        .filter(|s| passes_quality(s))
        .filter(|s| passes_content(s))
        .filter(|s| passes_recency(s))
        .cloned();

    match options.max_results {
        Some(max) => filtered.take(max).collect(),
        None => filtered.collect(),
    }
}

#[cfg(test)]
#[path = "quality_tests.rs"]
mod quality_tests;
