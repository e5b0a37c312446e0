//! Fuzzy course title resolution.

use std::collections::HashSet;

/// Minimum Dice coefficient for a trigram match to be accepted.
const MIN_SIMILARITY: f32 = 0.45;

/// Required lead of the best trigram match over the runner-up.
const MIN_MARGIN: f32 = 0.10;

/// Resolve a user-supplied course name to one of `titles`.
///
/// Tries, in order: case-insensitive equality, a unique case-insensitive
/// substring match, and character-trigram Dice similarity. Ambiguous or weak
/// matches resolve to `None`.
pub fn resolve_title<'a, I>(query: &str, titles: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let titles: Vec<&str> = titles.into_iter().collect();

    if let Some(exact) = titles.iter().find(|t| t.to_lowercase() == needle) {
        return Some(exact.to_string());
    }

    let containing: Vec<&&str> = titles
        .iter()
        .filter(|t| t.to_lowercase().contains(&needle))
        .collect();
    if containing.len() == 1 {
        return Some(containing[0].to_string());
    }

    let query_grams = trigrams(&needle);
    let mut scored: Vec<(f32, &str)> = titles
        .iter()
        .map(|t| (dice(&query_grams, &trigrams(t)), *t))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let (best_score, best) = *scored.first()?;
    let runner_up = scored.get(1).map(|(s, _)| *s).unwrap_or(0.0);

    if best_score >= MIN_SIMILARITY && best_score - runner_up >= MIN_MARGIN {
        tracing::debug!(query, title = best, score = best_score, "Fuzzy course match");
        Some(best.to_string())
    } else {
        tracing::debug!(query, best_score, runner_up, "No confident course match");
        None
    }
}

fn trigrams(text: &str) -> HashSet<String> {
    let normalized: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let padded: Vec<char> = format!(" {} ", normalized.join(" ").to_lowercase())
        .chars()
        .collect();

    padded.windows(3).map(|w| w.iter().collect()).collect()
}

fn dice(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    2.0 * shared as f32 / (a.len() + b.len()) as f32
}
