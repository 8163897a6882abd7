use std::cmp::Ordering;

use crate::normalize::normalize;
use crate::suggestion::Suggestion;

/// Order suggestions for display against what the user typed.
///
/// Exact match first, then prefix matches, then promoted, then most used,
/// then alphabetical by display name. The search term is normalized the
/// same way names are, so "Space Marines" matches `space_marines`. Stable,
/// and the input is left untouched.
pub fn rank(suggestions: &[Suggestion], search_term: &str) -> Vec<Suggestion> {
    let term = normalize(search_term);
    let mut ranked = suggestions.to_vec();
    ranked.sort_by(|a, b| compare(a, b, &term));
    ranked
}

fn compare(a: &Suggestion, b: &Suggestion, term: &str) -> Ordering {
    let exact = |s: &Suggestion| !term.is_empty() && s.name == term;
    let prefix = |s: &Suggestion| !term.is_empty() && s.name.starts_with(term);

    exact(b)
        .cmp(&exact(a))
        .then_with(|| prefix(b).cmp(&prefix(a)))
        .then_with(|| b.is_promoted.cmp(&a.is_promoted))
        .then_with(|| b.count.cmp(&a.count))
        .then_with(|| a.original_name.cmp(&b.original_name))
}
